use syntax_index::{
    LanguageKind, Probe, SyntaxError, is_declaration_kind, is_statement_kind, parse,
    parse_snippet, parse_snippet_for,
};

const CLASS_JS: &str = concat!(
    "const a = 1;\n",
    "class Greeter {\n",
    "  greet(name) {\n",
    "    const msg = \"hi \" + name;\n",
    "    return msg;\n",
    "  }\n",
    "}\n",
);

#[test]
fn point_in_method_body_resolves_to_method_not_class() {
    let tree = parse(LanguageKind::JavaScript, CLASS_JS).unwrap();
    let node = tree
        .find_enclosing_node_where(Probe::at(4, 6), 2, is_declaration_kind)
        .unwrap();
    assert_eq!(node.kind, "method_definition");
    assert_eq!((node.start_line(), node.end_line()), (3, 6));
    assert!(node.is_class_member());
}

#[test]
fn point_between_members_resolves_to_class() {
    let tree = parse(LanguageKind::JavaScript, CLASS_JS).unwrap();
    let node = tree
        .find_enclosing_node_where(Probe::at(3, 0), 1, is_declaration_kind)
        .unwrap();
    assert_eq!(node.kind, "class_declaration");
    assert_eq!((node.start_line(), node.end_line()), (2, 7));
}

#[test]
fn range_lookup_needs_both_ends_inside() {
    let tree = parse(LanguageKind::JavaScript, CLASS_JS).unwrap();
    let node = tree
        .find_enclosing_range(Probe::line(4), Probe::line(5), 1, is_statement_kind)
        .unwrap();
    assert_eq!(node.kind, "method_definition");
}

#[test]
fn top_level_statements_skip_comments() {
    let src = "// header\nconst a = 1;\n\nfunction f() {\n  return a;\n}\n";
    let tree = parse(LanguageKind::JavaScript, src).unwrap();
    let stmts = tree.top_level_statements();
    let spans: Vec<_> = stmts
        .iter()
        .map(|n| (n.kind.as_str(), n.start_line(), n.end_line()))
        .collect();
    assert_eq!(
        spans,
        vec![("lexical_declaration", 2, 2), ("function_declaration", 4, 6)]
    );
}

#[test]
fn python_block_end_stays_on_last_line() {
    let src = "def f():\n    return 1\n\nx = 2\n";
    let tree = parse(LanguageKind::Python, src).unwrap();
    let stmts = tree.top_level_statements();
    assert_eq!(stmts.len(), 2);
    assert_eq!((stmts[0].start_line(), stmts[0].end_line()), (1, 2));
    assert!(stmts[0].text.ends_with("return 1"));
    assert_eq!((stmts[1].start_line(), stmts[1].end_line()), (4, 4));
}

#[test]
fn replace_and_render_once() {
    let src = "function a() {\n  return 1;\n}\n\nfunction b() {\n  return 2;\n}\n";
    let mut tree = parse(LanguageKind::JavaScript, src).unwrap();
    let b = tree.top_level_statements()[1].clone();
    let snippet =
        parse_snippet(LanguageKind::JavaScript, "function b() {\n  return 3;\n}").unwrap();
    tree.replace(&b, &snippet).unwrap();
    assert_eq!(
        tree.render(),
        "function a() {\n  return 1;\n}\n\nfunction b() {\n  return 3;\n}\n"
    );
    // Source is untouched until render.
    assert_eq!(tree.source(), src);
}

#[test]
fn one_node_can_become_several() {
    let src = "let a = 1;\nlet b = 2;\n";
    let mut tree = parse(LanguageKind::JavaScript, src).unwrap();
    let first = tree.top_level_statements()[0].clone();
    let snippet =
        parse_snippet(LanguageKind::JavaScript, "const a0 = 0;\nconst a = a0 + 1;").unwrap();
    assert_eq!(snippet.node_count(), 2);
    tree.replace(&first, &snippet).unwrap();
    assert_eq!(tree.render(), "const a0 = 0;\nconst a = a0 + 1;\nlet b = 2;\n");
}

#[test]
fn overlapping_and_foreign_replacements_are_rejected() {
    let src = "function a() {\n  return 1;\n}\n";
    let mut tree = parse(LanguageKind::JavaScript, src).unwrap();
    let other = parse(LanguageKind::JavaScript, src).unwrap();
    let node = tree.top_level_statements()[0].clone();
    let snippet =
        parse_snippet(LanguageKind::JavaScript, "function a() {\n  return 2;\n}").unwrap();

    tree.replace(&node, &snippet).unwrap();
    let err = tree.replace(&node, &snippet).unwrap_err();
    assert!(matches!(err, SyntaxError::OverlappingEdit { .. }));

    let foreign = other.top_level_statements()[0].clone();
    let err = tree.replace(&foreign, &snippet).unwrap_err();
    assert!(matches!(err, SyntaxError::ForeignNode { .. }));
    assert_eq!(tree.pending_edits(), 1);
}

#[test]
fn class_member_snippet_is_checked_inside_a_class() {
    let src = "class A {\n  run() {\n    return 1;\n  }\n}\n";
    let mut tree = parse(LanguageKind::TypeScript, src).unwrap();
    let method = tree
        .find_enclosing_node_where(Probe::line(3), 2, is_declaration_kind)
        .unwrap();
    assert_eq!(method.kind, "method_definition");

    let snippet = parse_snippet_for(
        LanguageKind::TypeScript,
        "  run(): number {\n    return 2;\n  }\n",
        &method,
    )
    .unwrap();
    assert_eq!(snippet.kinds(), ["method_definition".to_string()]);

    tree.replace(&method, &snippet).unwrap();
    assert_eq!(
        tree.render(),
        "class A {\n  run(): number {\n    return 2;\n  }\n}\n"
    );
}

#[test]
fn dedented_python_reply_is_rebased_to_the_node() {
    let src = concat!(
        "class A:\n",
        "    def f(self, z):\n",
        "        if z:\n",
        "            y = eval(z)\n",
        "        return 1\n",
    );
    let mut tree = parse(LanguageKind::Python, src).unwrap();
    let node = tree
        .find_enclosing_node_where(Probe::line(4), 2, is_statement_kind)
        .unwrap();
    assert_eq!(node.kind, "if_statement");
    assert_eq!(tree.indent_of(&node), "        ");

    let snippet =
        parse_snippet(LanguageKind::Python, "if z:\n    y = ast.literal_eval(z)").unwrap();
    tree.replace(&node, &snippet).unwrap();
    assert_eq!(tree.render(), src.replace("eval(z)", "ast.literal_eval(z)"));
}

#[test]
fn replacement_that_breaks_the_file_is_refused() {
    let src = concat!(
        "struct S;\n",
        "\n",
        "impl S {\n",
        "    fn load(&self, raw: &str) -> i32 {\n",
        "        unsafe_parse(raw)\n",
        "    }\n",
        "}\n",
    );
    let mut tree = parse(LanguageKind::Rust, src).unwrap();
    let method = tree
        .find_enclosing_node_where(Probe::line(5), 2, is_declaration_kind)
        .unwrap();
    assert_eq!(method.kind, "function_item");
    // An expression statement parses at file level but not inside an impl.
    let snippet = parse_snippet(LanguageKind::Rust, "log(raw);").unwrap();

    let err = tree.check_replacement(&method, &snippet).unwrap_err();
    assert!(matches!(err, SyntaxError::RenderMismatch { line: 4, .. }));
    assert!(tree.replace(&method, &snippet).is_err());
    assert_eq!(tree.pending_edits(), 0);
    assert_eq!(tree.render(), src);
}

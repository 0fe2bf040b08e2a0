// ABOUTME: Integration tests for template compilation and its error taxonomy
// ABOUTME: Tests malformed tags, block structure, scoping rules and process id reuse across compiles

use tagc::engine::EngineError;
use tagc::template::program::{Node, Root};
use tagc::{ErrorKind, TemplateError};

mod common;
use common::TestProject;

fn compile_error(source: &str) -> TemplateError {
    let project = TestProject::new().template("test.tpl", source);
    match project.engine().compile("test.tpl") {
        Err(EngineError::Compile(err)) => err,
        Err(other) => panic!("expected a compile error, got {}", other),
        Ok(_) => panic!("expected {:?} to fail", source),
    }
}

#[test]
fn test_missing_end_tag() {
    for source in [
        "{if $a}x",
        "{section id=s source=$l}x",
        "{foreach id=f source=$l}x",
        "{literal}x",
    ] {
        let err = compile_error(source);
        assert_eq!(err.kind(), ErrorKind::Process, "{}", source);
        assert!(err.to_string().contains("missing end tag"), "{}", source);
    }
}

#[test]
fn test_outer_end_tag_with_open_inner_block() {
    let err = compile_error("{if $a}{section id=s source=$l}x{/if}");
    assert_eq!(err.kind(), ErrorKind::Process);
    assert!(err.to_string().contains("missing end tag"));
}

#[test]
fn test_stray_closing_tag() {
    let err = compile_error("x{/section}");
    assert_eq!(err.kind(), ErrorKind::Parsing);
}

#[test]
fn test_errors_carry_source_line() {
    let err = compile_error("one\ntwo\n{bogus tag}");
    assert_eq!(err.kind(), ErrorKind::Parsing);
    assert_eq!(err.line(), 3);
}

#[test]
fn test_non_ascii_tags_are_parsing_errors() {
    let err = compile_error("{é}");
    assert_eq!(err.kind(), ErrorKind::Parsing);
    assert!(err.to_string().contains("unrecognized tag 'é'"));

    let err = compile_error("Grüße\n{$naïve}");
    assert_eq!(err.kind(), ErrorKind::Parsing);
    assert_eq!(err.line(), 2);
}

#[test]
fn test_else_misuse() {
    let err = compile_error("{if $a}1{else}2{else}3{/if}");
    assert_eq!(err.kind(), ErrorKind::Contextual);

    let err = compile_error("{if $a}1{else}2{elseif $b}3{/if}");
    assert_eq!(err.kind(), ErrorKind::Contextual);
}

#[test]
fn test_section_attribute_errors() {
    let err = compile_error("{section source=$l}x{/section}");
    assert_eq!(err.kind(), ErrorKind::Contextual);
    assert!(err.to_string().contains("missing id-attribute"));

    let err = compile_error("{section id=s source=$l color=red}x{/section}");
    assert_eq!(err.kind(), ErrorKind::Contextual);

    let err = compile_error("{section id=s source=$l enable=sparkle}x{/section}");
    assert!(err.to_string().contains("unknown loop property 'sparkle'"));
}

#[test]
fn test_nested_duplicate_loop_id() {
    let err = compile_error("{section id=s source=$a}{foreach id=s source=$b}{/foreach}{/section}");
    assert_eq!(err.kind(), ErrorKind::Process);
}

#[test]
fn test_sibling_loops_reuse_ids() {
    let project = TestProject::new().template(
        "test.tpl",
        "{section id=s source=$a}x{/section}{section id=s source=$b}y{/section}",
    );
    assert!(project.engine().compile("test.tpl").is_ok());
}

#[test]
fn test_loop_variables_outside_their_loop() {
    let err = compile_error("{$cte.section.s.index}");
    assert_eq!(err.kind(), ErrorKind::Existence);

    let err = compile_error("{$l[s]}");
    assert_eq!(err.kind(), ErrorKind::Existence);
}

#[test]
fn test_system_variable_needs_keys() {
    let err = compile_error("{$cte}");
    assert_eq!(err.kind(), ErrorKind::Contextual);
    assert!(err.to_string().contains("missing required key(s)"));
}

#[test]
fn test_foreach_cannot_bind_system_variable() {
    let err = compile_error("{foreach id=f source=$l item=cte}{/foreach}");
    assert_eq!(err.kind(), ErrorKind::Contextual);
}

#[test]
fn test_unbalanced_parentheses() {
    let err = compile_error("{($a + 1}");
    assert_eq!(err.kind(), ErrorKind::Parsing);
    assert!(err.to_string().contains("unbalanced parentheses"));
}

#[test]
fn test_not_needs_grouping_before_comparison() {
    let err = compile_error("{if !$a == 1}x{/if}");
    assert_eq!(err.kind(), ErrorKind::Contextual);

    let project = TestProject::new().template("test.tpl", "{if !($a == 1)}x{/if}");
    assert!(project.engine().compile("test.tpl").is_ok());
}

#[test]
fn test_string_operand_rejected_by_arithmetic() {
    let err = compile_error("{$a + 'text'}");
    assert_eq!(err.kind(), ErrorKind::Contextual);
}

#[test]
fn test_block_tags_inside_dynamic_string() {
    let err = compile_error("{\"a {if $x}b{/if}\"}");
    assert_eq!(err.kind(), ErrorKind::Parsing);
}

#[test]
fn test_block_tags_inside_resource_value() {
    let project = TestProject::new()
        .sub_template("part.tpl", "{if 1}y{/if}")
        .template("test.tpl", "{@file[part.tpl]|upper}");
    let err = project.engine().compile("test.tpl").unwrap_err();
    let err = err.template_error().expect("compile error");
    assert_eq!(err.kind(), ErrorKind::Contextual);
    assert!(err.to_string().contains("cannot exist inline"));
}

#[test]
fn test_resource_value_is_rendered_inline() {
    let project = TestProject::new()
        .sub_template("part.tpl", "hi {'there'}")
        .template("test.tpl", "{@file[part.tpl]|upper}");
    assert_eq!(project.engine().fetch("test.tpl").unwrap(), "HI THERE");
}

#[test]
fn test_parameters_only_follow_resources() {
    let err = compile_error("{$a title='x'}");
    assert_eq!(err.kind(), ErrorKind::Contextual);
}

#[test]
fn test_process_ids_restart_for_each_compile() {
    let project = TestProject::new()
        .sub_template("rows.tpl", "{section id=r source=$rows}{$rows[r]}{/section}")
        .template(
            "test.tpl",
            "{section id=s source=$l}{/section}{@file[rows.tpl] rows=$l}",
        );
    let engine = project.engine();
    let first = engine.compile("test.tpl").unwrap();
    let second = engine.compile("test.tpl").unwrap();
    assert_eq!(first.body, second.body);

    match &first.body[0] {
        Node::Section(section) => assert_eq!(section.unit, 1),
        other => panic!("expected a section, got {:?}", other),
    }
    match &first.body[1] {
        Node::Section(section) => assert!(section.unit > 1),
        other => panic!("expected the included section, got {:?}", other),
    }
}

#[test]
fn test_root_variables_compile_to_user_paths() {
    let project = TestProject::new().template("test.tpl", "{$name}");
    let artifact = project.engine().compile("test.tpl").unwrap();
    match &artifact.body[0] {
        Node::Print { expr } => assert_eq!(
            expr,
            &tagc::template::program::Expr::Path {
                root: Root::User {
                    name: "name".to_string()
                },
                segments: vec![],
            }
        ),
        other => panic!("expected a print, got {:?}", other),
    }
}

#[test]
fn test_used_modifiers_are_recorded() {
    let project = TestProject::new().template("test.tpl", "{$a|upper}{$b|lower|upper}");
    let artifact = project.engine().compile("test.tpl").unwrap();
    let mut modifiers = artifact.modifiers.clone();
    modifiers.sort();
    assert_eq!(modifiers, vec!["lower".to_string(), "upper".to_string()]);
}

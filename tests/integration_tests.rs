// ABOUTME: End-to-end rendering tests for the template language
// ABOUTME: Tests prints, conditions, loops, modifiers, literals, comments and included sub-templates

use serde_json::json;
use tagc::engine::EngineError;
use tagc::{ErrorKind, Value};

mod common;
use common::{render, TestProject};

fn compile_kind(err: &EngineError) -> ErrorKind {
    err.template_error()
        .map(|e| e.kind())
        .expect("expected a compile error")
}

#[test]
fn test_plain_text_passes_through() {
    assert_eq!(render("just text\nand more", &[]).unwrap(), "just text\nand more");
}

#[test]
fn test_print_variable_keys() {
    let user = Value::from(json!({"name": "Ada", "tags": ["x", "y"]}));
    let output = render("{$user.name} {$user.tags.1} {$user.tags[0]}", &[("user", user)]).unwrap();
    assert_eq!(output, "Ada y x");
}

#[test]
fn test_dynamic_key() {
    let vars = [
        ("map", Value::from(json!({"a": 1, "b": 2}))),
        ("k", Value::from("b")),
    ];
    assert_eq!(render("{$map[$k]}", &vars).unwrap(), "2");
}

#[test]
fn test_missing_root_variable_prints_nothing() {
    assert_eq!(render("[{$nobody}]", &[]).unwrap(), "[]");
}

#[test]
fn test_logical_and_example() {
    let vars = [("a", Value::from(true)), ("b", Value::from(false))];
    let output = render("{if $a&&$b}X{else}Y{/if}", &vars).unwrap();
    assert_eq!(output, "Y");
}

#[test]
fn test_elseif_chain() {
    let template = "{if $n > 10}big{elseif $n > 1}medium{else}small{/if}";
    assert_eq!(render(template, &[("n", Value::from(20))]).unwrap(), "big");
    assert_eq!(render(template, &[("n", Value::from(5))]).unwrap(), "medium");
    assert_eq!(render(template, &[("n", Value::from(0))]).unwrap(), "small");
}

#[test]
fn test_word_operators() {
    let vars = [("a", Value::from(1)), ("b", Value::from(0))];
    let output = render("{if $a eq 1 and not $b}yes{/if}", &vars).unwrap();
    assert_eq!(output, "yes");
}

#[test]
fn test_function_operators() {
    let vars = [
        ("n", Value::from(4)),
        ("list", Value::from(vec!["a", "b", "c"])),
        ("empty", Value::from(Vec::<Value>::new())),
    ];
    let template = "{if $n is even}E{/if}{if $n is div by 3}D{/if}{if $list is not empty}L{/if}\
                    {if $empty empty}Z{/if}{if isset $n}S{/if}{count $list}";
    assert_eq!(render(template, &vars).unwrap(), "ELZS3");
}

#[test]
fn test_arithmetic_is_left_associative() {
    let vars = [("n", Value::from(1))];
    assert_eq!(render("{$n + 2 * 3}", &vars).unwrap(), "9");
    assert_eq!(render("{$n + (2 * 3)}", &vars).unwrap(), "7");
}

#[test]
fn test_section_example() {
    let vars = [("list", Value::from(vec!["a", "b", "c"]))];
    let template =
        "{section id=i source=$list enable=index,size}{$cte.section.i.index}{/section}";
    assert_eq!(render(template, &vars).unwrap(), "012");
}

#[test]
fn test_section_items_and_sectionelse() {
    let vars = [
        ("list", Value::from(vec!["a", "b", "c"])),
        ("none", Value::from(Vec::<Value>::new())),
    ];
    let template = "{section id=i source=$list step=2}{$list[i]}{/section}|\
                    {section id=j source=$none}x{sectionelse}empty{/section}";
    assert_eq!(render(template, &vars).unwrap(), "ac|empty");
}

#[test]
fn test_section_first_and_last() {
    let vars = [("list", Value::from(vec![1, 2, 3]))];
    let template = "{section id=s source=$list enable=first,last}\
                    {if $cte.section.s.first}[{/if}{$list[s]}{if $cte.section.s.last}]{/if}\
                    {/section}";
    assert_eq!(render(template, &vars).unwrap(), "[123]");
}

#[test]
fn test_foreach_over_list_of_maps() {
    let users = Value::from(json!([{"name": "Ada"}, {"name": "Bob"}]));
    let template = "{foreach id=f source=$users item=u key=k}{$k}={$u.name};{/foreach}";
    assert_eq!(render(template, &[("users", users)]).unwrap(), "0=Ada;1=Bob;");
}

#[test]
fn test_foreach_over_map_and_foreachelse() {
    let vars = [
        ("prices", Value::from(json!({"tea": 2, "cake": 5}))),
        ("none", Value::Null),
    ];
    let template = "{foreach id=p source=$prices item=v key=k}{$k}:{$v} {/foreach}\
                    {foreach id=q source=$none item=v}x{foreachelse}nothing{/foreach}";
    assert_eq!(render(template, &vars).unwrap(), "cake:5 tea:2 nothing");
}

#[test]
fn test_foreach_item_alias_is_restored() {
    let vars = [
        ("item", Value::from("outer")),
        ("list", Value::from(vec!["inner"])),
    ];
    let template = "{foreach id=f source=$list item=item}{$item}{/foreach}-{$item}";
    assert_eq!(render(template, &vars).unwrap(), "inner-outer");
}

#[test]
fn test_modifiers() {
    let vars = [
        ("name", Value::from("ada lovelace")),
        ("html", Value::from("<b>")),
    ];
    let template = "{$name|upper} {$name|capitalize} {$html|escape} {$missing|default:'anon'}";
    assert_eq!(
        render(template, &vars).unwrap(),
        "ADA LOVELACE Ada Lovelace &lt;b&gt; anon"
    );
}

#[test]
fn test_modifier_chain() {
    let vars = [("name", Value::from("Ada"))];
    assert_eq!(render("{$name|lower|upper}", &vars).unwrap(), "ADA");
}

#[test]
fn test_unknown_modifier() {
    let err = render("{$name|sparkle}", &[]).unwrap_err();
    assert_eq!(compile_kind(&err), ErrorKind::Existence);
}

#[test]
fn test_custom_modifier() {
    struct Shout;

    impl tagc::Modifier for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn arg_format(&self) -> Vec<Option<Value>> {
            vec![Some(Value::from("!"))]
        }

        fn apply(&self, target: &Value, args: &[Value]) -> tagc::plugins::Result<Value> {
            Ok(Value::from(format!(
                "{}{}",
                target.to_output(),
                args[0].to_output()
            )))
        }
    }

    let project = TestProject::new().template("index.tpl", "{$word|shout}{$word|shout:'?'}");
    let mut engine = project.engine();
    engine.register_modifier(Box::new(Shout));
    engine.create_var("word", "hey").unwrap();
    assert_eq!(engine.fetch("index.tpl").unwrap(), "hey!hey?");
}

#[test]
fn test_strings() {
    let vars = [("name", Value::from("Ada"))];
    let output = render("{'single {$name}'} {\"double {$name}\"}", &vars).unwrap();
    assert_eq!(output, "single {$name} double Ada");
}

#[test]
fn test_literal_and_comments() {
    let output = render("a{* hidden *}b{literal}{$x} {if}{/literal}c", &[]).unwrap();
    assert_eq!(output, "ab{$x} {if}c");
}

#[test]
fn test_bad_comment_syntax() {
    let err = render("{* unterminated}", &[]).unwrap_err();
    assert_eq!(compile_kind(&err), ErrorKind::Parsing);
}

#[test]
fn test_included_template_with_parameter() {
    let project = TestProject::new()
        .sub_template("header.tpl", "Header:{$title}")
        .template("index.tpl", "{@file[header.tpl] title='Hi'}|body");
    assert_eq!(project.engine().fetch("index.tpl").unwrap(), "Header:Hi|body");
}

#[test]
fn test_strict_scope_rejects_unpassed_variable() {
    let project = TestProject::new()
        .sub_template("sub.tpl", "{$userVar}")
        .template("index.tpl", "{@file[sub.tpl]}");
    let mut engine = project.engine();
    engine.create_var("userVar", "visible").unwrap();

    let err = engine.fetch("index.tpl").unwrap_err();
    let template_error = err.template_error().expect("compile error");
    assert_eq!(template_error.kind(), ErrorKind::Existence);
    assert!(matches!(
        template_error.root_cause(),
        tagc::TemplateError::VariableNotFound { name, .. } if name == "userVar"
    ));
    assert_eq!(template_error.resource_trace(), vec!["file[sub.tpl]"]);
}

#[test]
fn test_strict_scope_accepts_passed_parameter() {
    let project = TestProject::new()
        .sub_template("sub.tpl", "{$userVar}")
        .template("index.tpl", "{@file[sub.tpl] userVar=$userVar}");
    let mut engine = project.engine();
    engine.create_var("userVar", "visible").unwrap();

    assert_eq!(engine.fetch("index.tpl").unwrap(), "visible");
}

#[test]
fn test_relaxed_scope_sees_root_variables() {
    let project = TestProject::new()
        .with_strict_scope(false)
        .sub_template("sub.tpl", "{$userVar}")
        .template("index.tpl", "{@file[sub.tpl]}");
    let mut engine = project.engine();
    engine.create_var("userVar", "visible").unwrap();

    assert_eq!(engine.fetch("index.tpl").unwrap(), "visible");
}

#[test]
fn test_dynamic_string_parameter_keeps_caller_variables() {
    let project = TestProject::new()
        .sub_template("greet.tpl", "<{$title}>")
        .template("index.tpl", "{@file[greet.tpl] title=\"Dear {$name}\"}");
    let mut engine = project.engine();
    engine.create_var("name", "Ada").unwrap();

    assert_eq!(engine.fetch("index.tpl").unwrap(), "<Dear Ada>");
}

#[test]
fn test_pass_through_resource() {
    let project = TestProject::new()
        .sub_template("note.txt", "{raw} text")
        .template("index.tpl", "[{@file[note.txt]}]");
    assert_eq!(project.engine().fetch("index.tpl").unwrap(), "[{raw} text]");
}

#[test]
fn test_parameters_rejected_for_pass_through() {
    let project = TestProject::new()
        .sub_template("note.txt", "text")
        .template("index.tpl", "{@file[note.txt] a=1}");
    let err = project.engine().fetch("index.tpl").unwrap_err();
    assert_eq!(compile_kind(&err), ErrorKind::Contextual);
}

#[test]
fn test_self_inclusion_is_recursion() {
    let project = TestProject::new()
        .sub_template("loop.tpl", "again {@file[loop.tpl]}")
        .template("index.tpl", "{@file[loop.tpl]}");
    let err = project.engine().fetch("index.tpl").unwrap_err();
    assert_eq!(compile_kind(&err), ErrorKind::Recursion);
}

#[test]
fn test_same_resource_twice_is_not_recursion() {
    let project = TestProject::new()
        .sub_template("dot.tpl", ".")
        .template("index.tpl", "{@file[dot.tpl]}{@file[dot.tpl]}");
    assert_eq!(project.engine().fetch("index.tpl").unwrap(), "..");
}

#[test]
fn test_missing_resource() {
    let project = TestProject::new().template("index.tpl", "{@file[nope.tpl]}");
    let err = project.engine().fetch("index.tpl").unwrap_err();
    assert_eq!(compile_kind(&err), ErrorKind::Existence);
}

#[test]
fn test_unknown_dsn() {
    let project = TestProject::new().template("index.tpl", "{@db[users]}");
    let err = project.engine().fetch("index.tpl").unwrap_err();
    assert_eq!(compile_kind(&err), ErrorKind::Existence);
}

#[test]
fn test_custom_resource_provider() {
    struct Greeting;

    impl tagc::ResourceProvider for Greeting {
        fn load(&self, path: &str) -> tagc::resource::Result<tagc::ResourceData> {
            Ok(tagc::ResourceData {
                content: format!("hello {}", path),
                render_mode: tagc::RenderMode::PassThrough,
                delimiters: None,
            })
        }
    }

    let project = TestProject::new().template("index.tpl", "{@greet[world]}");
    let mut engine = project.engine();
    engine
        .register_provider("greet", "greeting", |_| {
            Box::new(Greeting) as Box<dyn tagc::ResourceProvider>
        })
        .unwrap();
    assert_eq!(engine.fetch("index.tpl").unwrap(), "hello world");
}

#[test]
fn test_custom_delimiters() {
    let project = TestProject::new()
        .configure(|config| {
            config.delimiters.start = "<%".to_string();
            config.delimiters.end = "%>".to_string();
        })
        .template("index.tpl", "{kept} <%$name%>");
    let mut engine = project.engine();
    engine.create_var("name", "Ada").unwrap();
    assert_eq!(engine.fetch("index.tpl").unwrap(), "{kept} Ada");
}

#[test]
fn test_version_variable() {
    assert_eq!(render("{$cte.version}", &[]).unwrap(), tagc::VERSION);
}

#[test]
fn test_multibyte_text_comments_and_strings() {
    let vars = [("name", Value::from("Zoë"))];
    let template = "Grüße {* Kommentar über *}{$name} – {'naïve'} {\"Hallo {$name}\"}\
                    {literal}{über}{/literal}";
    assert_eq!(
        render(template, &vars).unwrap(),
        "Grüße Zoë – naïve Hallo Zoë{über}"
    );
}

#[test]
fn test_section_with_maximal_step() {
    let vars = [("list", Value::from(vec!["a", "b", "c"]))];
    let template = "{section id=i source=$list step=9223372036854775807}{$list[i]}{/section}";
    assert_eq!(render(template, &vars).unwrap(), "a");

    let template = "{section id=i source=$list start=1 step=9223372036854775806}\
                    {$list[i]}{/section}";
    assert_eq!(render(template, &vars).unwrap(), "b");
}

#[test]
fn test_section_start_before_collection() {
    let vars = [("list", Value::from(vec!["a", "b", "c"]))];
    let template = "{section id=i source=$list start=-10}{$list[i]}{/section}";
    assert_eq!(render(template, &vars).unwrap(), "abc");

    let template =
        "{section id=i source=$list start=-9223372036854775807 step=2}{$list[i]}{/section}";
    assert_eq!(render(template, &vars).unwrap(), "ac");

    let template =
        "{section id=i source=$list max=9223372036854775807}{$list[i]}{/section}";
    assert_eq!(render(template, &vars).unwrap(), "abc");
}

#[test]
fn test_function_phrases_ignore_case() {
    let vars = [("n", Value::from(6))];
    let template = "{if $n IS EVEN}E{/if}{if $n Is Not Div By 4}N{/if}";
    assert_eq!(render(template, &vars).unwrap(), "EN");
}

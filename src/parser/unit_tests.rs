use super::api::{
    describe_error, parse_eval, parse_function, parse_program, JsParser, ParseOptions, Rule,
};
use super::ast::*;
use super::static_semantics::Resolution;

use pest::consumes_to;
use pest::parses_to;
use pest::Parser;
use std::rc::Rc;
use std::time::Instant;

fn parse(text: &str) -> Rc<Code> {
    match parse_program(text, "test.js", ParseOptions::default()) {
        Ok(code) => code,
        Err(e) => panic!("Parse failed for {:?}: {}", text, describe_error(&e)),
    }
}

fn parse_error(text: &str) -> String {
    match parse_program(text, "test.js", ParseOptions::default()) {
        Ok(code) => panic!("Expected a syntax error, got {:?}", code),
        Err(e) => describe_error(&e),
    }
}

fn single_expression(code: &Code) -> &ExpressionType {
    match code.body.as_slice() {
        [StatementType::ExpressionStatement { expression, .. }] => expression,
        other => panic!("Expected one expression statement, got {:?}", other),
    }
}

#[test]
fn test_numeric_literal_token() {
    parses_to! {
        parser: JsParser,
        input: "10.5e3",
        rule: Rule::numeric_literal,
        tokens: [
            numeric_literal(0, 6)
        ]
    };
}

#[test]
fn test_string_literal_token() {
    parses_to! {
        parser: JsParser,
        input: "'it\\'s'",
        rule: Rule::string_literal,
        tokens: [
            string_literal(0, 7)
        ]
    };
}

#[test]
fn test_expression_statement_tokens() {
    parses_to! {
        parser: JsParser,
        input: "x;",
        rule: Rule::expression_statement,
        tokens: [
            expression_statement(0, 2, [
                expression(0, 1, [
                    assignment_expression(0, 1, [
                        conditional_expression(0, 1, [
                            binary_expression(0, 1, [
                                unary_expression(0, 1, [
                                    postfix_expression(0, 1, [
                                        left_hand_side_expression(0, 1, [
                                            member_expression(0, 1, [
                                                identifier(0, 1)
                                            ])
                                        ])
                                    ])
                                ])
                            ])
                        ])
                    ])
                ])
            ])
        ]
    };
}

#[test]
fn test_reserved_word_is_not_identifier() {
    assert!(JsParser::parse(Rule::identifier, "var").is_err());
    assert!(JsParser::parse(Rule::identifier, "variable").is_ok());
}

#[test]
fn test_multiplication_binds_tighter() {
    let code = parse("1 + 2 * 3");
    match single_expression(&code) {
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Add,
            right,
            ..
        } => match right.as_ref() {
            ExpressionType::BinaryExpression { operator, .. } => {
                assert_eq!(*operator, BinaryOperator::Multiply)
            }
            other => panic!("Unexpected right operand {:?}", other),
        },
        other => panic!("Unexpected expression {:?}", other),
    }
}

#[test]
fn test_logical_operators_fold_left() {
    let code = parse("a || b && c");
    match single_expression(&code) {
        ExpressionType::LogicalExpression {
            operator: LogicalOperator::Or,
            right,
            ..
        } => assert!(matches!(
            right.as_ref(),
            ExpressionType::LogicalExpression {
                operator: LogicalOperator::And,
                ..
            }
        )),
        other => panic!("Unexpected expression {:?}", other),
    }
}

#[test]
fn test_automatic_semicolon_insertion() {
    let code = parse("var a = 1\nvar b = 2\na\n++b");
    assert_eq!(code.body.len(), 4);
    assert!(matches!(
        code.body[3],
        StatementType::ExpressionStatement {
            expression: ExpressionType::UpdateExpression { prefix: true, .. },
            ..
        }
    ));
}

#[test]
fn test_restricted_return() {
    let code = parse("function f() { return\n1 }");
    let f = &code.functions[0];
    assert_eq!(f.body.len(), 2);
    assert!(matches!(
        f.body[0],
        StatementType::ReturnStatement { argument: None, .. }
    ));
}

#[test]
fn test_hoisting_lists() {
    let code = parse("var a; function f() {} var a, b; if (x) { var c; }");
    let names: Vec<&str> = code.variables.iter().map(|v| &**v).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(code.functions.len(), 1);
    assert_eq!(code.functions[0].name.as_deref(), Some("f"));
}

#[test]
fn test_array_holes() {
    let code = parse("[1,,2,]");
    match single_expression(&code) {
        ExpressionType::ArrayExpression { elements, .. } => {
            assert_eq!(elements.len(), 3);
            assert!(elements[0].is_some());
            assert!(elements[1].is_none());
            assert!(elements[2].is_some());
        }
        other => panic!("Unexpected expression {:?}", other),
    }
}

#[test]
fn test_object_literal_keys() {
    let code = parse("({1.0: 'x', 'b': 2, get c() { return 1; }, set c(v) {}})");
    match single_expression(&code) {
        ExpressionType::ObjectExpression { properties, .. } => {
            let keys: Vec<&str> = properties.iter().map(|p| &*p.key).collect();
            assert_eq!(keys, vec!["1", "b", "c", "c"]);
            assert_eq!(properties[2].kind, PropertyKind::Get);
            assert_eq!(properties[3].kind, PropertyKind::Set);
        }
        other => panic!("Unexpected expression {:?}", other),
    }
}

#[test]
fn test_keyword_as_property_name() {
    let code = parse("a.if");
    match single_expression(&code) {
        ExpressionType::MemberExpression { property, .. } => assert!(matches!(
            property.as_ref(),
            ExpressionType::Literal {
                value: LiteralType::StringLiteral(_),
                ..
            }
        )),
        other => panic!("Unexpected expression {:?}", other),
    }
}

#[test]
fn test_new_with_and_without_arguments() {
    let code = parse("new Foo(1).bar; new Foo;");
    assert!(matches!(
        code.body[0],
        StatementType::ExpressionStatement {
            expression: ExpressionType::MemberExpression { .. },
            ..
        }
    ));
    assert!(matches!(
        code.body[1],
        StatementType::ExpressionStatement {
            expression: ExpressionType::NewExpression { .. },
            ..
        }
    ));
}

#[test]
fn test_for_in_with_var() {
    let code = parse("for (var k in o) {}");
    assert!(matches!(
        code.body[0],
        StatementType::ForInStatement {
            left: ForInTarget::VariableDeclaration(_),
            ..
        }
    ));
    assert_eq!(&*code.variables[0], "k");
}

#[test]
fn test_use_strict_directive() {
    assert!(parse("'use strict'; var x;").strict);
    assert!(!parse("'use\\x20strict'; var x;").strict);
    assert!(!parse("var x; 'use strict';").strict);
    let code = parse("function f() { 'use strict'; }");
    assert!(!code.strict);
    assert!(code.functions[0].strict);
}

#[test]
fn test_strict_mode_early_errors() {
    assert!(parse_error("'use strict'; with (a) {}").contains("with"));
    assert!(parse_error("'use strict'; var eval;").contains("strict"));
    assert!(parse_error("'use strict'; arguments = 1;").contains("strict"));
    assert!(parse_error("'use strict'; 010").contains("Octal"));
    assert!(parse_error("'use strict'; '\\101'").contains("Octal"));
    assert!(parse_error("'use strict'; delete x;").contains("Delete"));
    assert!(parse_error("function f(a, a) { 'use strict'; }").contains("Duplicate"));
    assert!(parse_error("'use strict'; var let;").contains("reserved"));
    assert!(parse_error("'use strict'; if (a) { function f() {} }").contains("top level"));
    parse("with (a) {} var eval; 010; delete x; function g(a, a) {}");
}

#[test]
fn test_control_flow_early_errors() {
    assert!(parse_error("break;").contains("Illegal break"));
    assert!(parse_error("while (a) { function f() { continue; } }").contains("Illegal continue"));
    assert!(parse_error("a: { continue a; }").contains("Illegal continue"));
    assert!(parse_error("a: a: ;").contains("already been declared"));
    assert!(parse_error("return 1;").contains("Illegal return"));
    assert!(parse_error("b: while (1) { break c; }").contains("Undefined label"));
    assert!(parse_error("switch (a) { default: default: }").contains("default"));
    parse("a: { break a; } b: for (;;) { c: while (1) { continue b; } }");
}

#[test]
fn test_invalid_assignment_targets() {
    assert!(parse_error("1 = 2").contains("left-hand side"));
    parse("a + b++");
    assert!(parse_error("f()++").contains("left-hand side"));
}

#[test]
fn test_duplicate_properties() {
    parse("({a: 1, a: 2})");
    assert!(parse_error("'use strict'; ({a: 1, a: 2})").contains("Duplicate"));
    assert!(parse_error("({get a() {}, a: 1})").contains("Duplicate"));
    assert!(parse_error("({get a() {}, get a() {}})").contains("Duplicate"));
    parse("({get a() {}, set a(v) {}})");
}

#[test]
fn test_syntax_error_location() {
    let message = parse_error("var a = ;");
    assert!(message.starts_with("Unexpected token"));
    assert!(message.contains("(1:"));
}

#[test]
fn test_direct_eval_is_recorded() {
    let code = parse("function f() { eval('1'); } function g() { var e = eval; e('1'); }");
    assert!(code.functions[0].exists_direct_eval);
    assert!(!code.functions[1].exists_direct_eval);
}

#[test]
fn test_parameters_become_local_slots() {
    let code = parse("function f(a) { var b = a; return b; }");
    let f = &code.functions[0];
    let tree = f.scopes.borrow();
    assert_eq!(tree.local_slot(f.scope, "a"), Some(0));
    assert!(tree.is_collapsed(f.scope));
    assert_eq!(tree.resolve(f.scope, "b"), Resolution::Local(2));
}

#[test]
fn test_closure_keeps_environment() {
    let code = parse("function f(a) { return function () { return a; }; }");
    let f = &code.functions[0];
    let tree = f.scopes.borrow();
    assert_eq!(tree.local_slot(f.scope, "a"), None);
    assert!(!tree.is_collapsed(f.scope));
}

#[test]
fn test_collapse_can_be_disabled() {
    let options = ParseOptions {
        collapse_environments: false,
    };
    let code = parse_program("function f(a) { return a; }", "test.js", options).unwrap();
    let f = &code.functions[0];
    assert_eq!(f.scopes.borrow().local_slot(f.scope, "a"), None);
}

#[test]
fn test_parse_function_wrapper() {
    let f = parse_function("a, b", "return a + b;", ParseOptions::default()).unwrap();
    assert_eq!(f.name.as_deref(), Some("anonymous"));
    let params: Vec<&str> = f.params.iter().map(|p| &**p).collect();
    assert_eq!(params, vec!["a", "b"]);
    assert!(parse_function("", "}{", ParseOptions::default()).is_err());
    assert!(parse_function("a) {", "", ParseOptions::default()).is_err());
}

#[test]
fn test_eval_code_inherits_strictness() {
    let code = parse_eval("var x = 1;", true, ParseOptions::default()).unwrap();
    assert!(code.strict);
    assert_eq!(code.code_type, CodeType::Eval);
    assert!(parse_eval("with (a) {}", true, ParseOptions::default()).is_err());
}

#[test]
fn test_perf_nested_arrays() {
    let start = Instant::now();
    let result = parse_program("[[[[[[[[]]]]]]]]", "test.js", ParseOptions::default());
    let end = Instant::now();
    assert!(result.is_ok());
    assert!(
        end.saturating_duration_since(start).as_millis() < 800,
        "Script taking too long to parse."
    );
}

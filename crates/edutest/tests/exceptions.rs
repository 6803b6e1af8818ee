//! Message filtering applied to faults from invoked code

mod common;

use edutest::reflect::{self, MemberDescriptor};
use edutest::runtime::{kinds, Fault, InvokeError, Type};
use edutest::{types, ExceptionMessageFilter, FailureKind, ReflexClass};

fn friendly_messages() -> ExceptionMessageFilter {
    ExceptionMessageFilter::new()
        .with_function(|fault: &Fault| {
            (fault.type_name() == kinds::ILLEGAL_STATE && fault.message() == Some("bad value."))
                .then(|| "The value was rejected.".to_string())
        })
        .with_function(|fault: &Fault| {
            (fault.type_name() == kinds::NO_CLASS_DEF).then(|| "Class setup failed.".to_string())
        })
}

#[test]
fn test_filter_reflective_fault() {
    let thrower = ReflexClass::load(common::shared(), "shop.Thrower").unwrap();
    let check = thrower
        .static_method("check")
        .returning(types::int())
        .taking((types::int(),));
    let err = check.invoke((1,)).unwrap_err();
    let original = err.fault().unwrap().clone();

    let filtered = friendly_messages().filter_error(err);
    assert_eq!(filtered.kind(), FailureKind::PropagatedFault);
    let fault = filtered.fault().unwrap();
    assert_eq!(fault.message(), Some("The value was rejected."));
    assert_eq!(fault.type_name(), kinds::ILLEGAL_STATE);
    assert_eq!(fault.stack(), original.stack());
}

#[test]
fn test_diagnostics_pass_through() {
    let account = ReflexClass::load(common::shared(), "shop.Account").unwrap();
    let err = account
        .method("withdraw")
        .returning_void()
        .taking_no_params()
        .require_exists()
        .unwrap_err();
    let message = err.message();
    let filtered = friendly_messages().filter_error(err);
    assert_eq!(filtered.kind(), FailureKind::MemberNotFound);
    assert_eq!(filtered.message(), message);
}

#[test]
fn test_run_with_interpreted_code() {
    let reflector = common::reflector();
    let class = reflector.find_class("shop.FaultyInit").unwrap();
    let get = reflect::require_method(&MemberDescriptor::method(&class, "get", vec![])).unwrap();
    let call = || match get.invoke(None, &[]) {
        Ok(value) => Ok(value),
        Err(InvokeError::Target(fault)) => Err(fault),
        Err(other) => panic!("unexpected invocation error: {}", other),
    };

    let filter = friendly_messages();
    // the initializer's own fault has no replacement
    let first = filter.run(call).unwrap_err();
    assert_eq!(first.message(), Some("init failed"));
    let second = filter.run(call).unwrap_err();
    assert_eq!(second.type_name(), kinds::NO_CLASS_DEF);
    assert_eq!(second.message(), Some("Class setup failed."));
}

#[test]
fn test_chained_cause_messages() {
    let thrower = common::shared().find_class("shop.Thrower").unwrap();
    let check = reflect::require_method(&MemberDescriptor::method(
        &thrower,
        "check",
        vec![Type::Primitive(edutest::bytecode::PrimitiveType::Int)],
    ))
    .unwrap();
    let cause = match check.invoke(None, &[edutest::runtime::Value::Int(2)]) {
        Err(InvokeError::Target(fault)) => fault,
        other => panic!("unexpected outcome: {:?}", other),
    };
    let outer = Fault::caused_by(kinds::ILLEGAL_ARGUMENT, Some("grading failed".into()), cause);

    let mut filter = friendly_messages();
    filter.set_chaining_cause_messages(true);
    let filtered = filter.filter(&outer);
    assert_eq!(filtered.message(), Some("grading failed: The value was rejected."));
    assert_eq!(filtered.cause().unwrap().message(), Some("The value was rejected."));
}

//! Lookup, access checks and invocation through the reflective layer

mod common;

use edutest::bytecode::PrimitiveType;
use edutest::reflect::{self, get_nice_exception, primitive_type_to_object_type};
use edutest::runtime::{builtins, kinds, Fault, Type, Value};
use edutest::{AccessSet, FailureKind, MemberDescriptor, ReflectError};

fn int() -> Type {
    Type::Primitive(PrimitiveType::Int)
}

fn double() -> Type {
    Type::Primitive(PrimitiveType::Double)
}

fn string() -> Type {
    Type::Class(builtins::string())
}

fn kind_and_message(err: ReflectError) -> (FailureKind, String) {
    (err.kind(), err.message())
}

#[test]
fn test_find_class() {
    common::english();
    let reflector = common::reflector();
    let account = reflector.find_class("shop.Account").unwrap();
    assert_eq!(account.name(), "shop.Account");
    assert_eq!(account.simple_name(), "Account");

    let again = reflector.find_class("shop.Account").unwrap();
    assert_eq!(again.id(), account.id());
}

#[test]
fn test_find_class_not_found() {
    common::english();
    let reflector = common::reflector();

    let (kind, message) = kind_and_message(reflector.find_class("shop.Missing").unwrap_err());
    assert_eq!(kind, FailureKind::ClassNotFound);
    assert_eq!(
        message,
        "Class `shop.Missing` not found. Make sure it is in the right package."
    );

    let (kind, message) = kind_and_message(reflector.find_class("Missing").unwrap_err());
    assert_eq!(kind, FailureKind::ClassNotFound);
    assert_eq!(message, "Class `Missing` not found.");
}

#[test]
fn test_find_class_with_slash_is_misuse() {
    let reflector = common::reflector();
    let err = reflector.find_class("shop/Account").unwrap_err();
    assert_eq!(err.kind(), FailureKind::Misuse);
    assert!(err.message().contains("'.'"));
}

#[test]
fn test_new_instance_of_class_isolates_statics() {
    let reflector = common::reflector();
    let shared = reflector.find_class("shop.Account").unwrap();
    let first = reflector.new_instance_of_class("shop.Account").unwrap();
    let second = reflector.new_instance_of(&shared).unwrap();

    assert_ne!(first.id(), shared.id());
    assert_ne!(first.id(), second.id());
    assert_eq!(first.name(), shared.name());

    let ctor = reflect::require_constructor(&MemberDescriptor::constructor(&first, vec![int()]))
        .unwrap();
    reflect::invoke_constructor(&ctor, &[Value::Int(1)]).unwrap();
    reflect::invoke_constructor(&ctor, &[Value::Int(2)]).unwrap();

    assert_eq!(first.get_static("opened").unwrap(), Value::Int(2));
    assert_eq!(second.get_static("opened").unwrap(), Value::Int(0));
    assert_eq!(shared.get_static("opened").unwrap(), Value::Int(0));
}

#[test]
fn test_isolated_class_sees_shared_dependencies() {
    let reflector = common::reflector();
    let shared_account = reflector.find_class("shop.Account").unwrap();
    let savings = reflector.new_instance_of_class("shop.Savings").unwrap();

    let parent = savings.superclass().unwrap();
    assert_eq!(parent.id(), shared_account.id());
    assert!(savings.is_subclass_of(&shared_account));
}

#[test]
fn test_require_method_walks_superclasses() {
    let reflector = common::reflector();
    let savings = reflector.find_class("shop.Savings").unwrap();
    let descriptor = MemberDescriptor::method(&savings, "getBalance", vec![])
        .with_return_type(int())
        .with_static(false)
        .with_access(AccessSet::PUBLIC);
    let method = reflect::require_method(&descriptor).unwrap();
    assert_eq!(method.declaring_class().name(), "shop.Account");

    let ctor = reflect::require_constructor(&MemberDescriptor::constructor(&savings, vec![]))
        .unwrap();
    let instance = reflect::invoke_constructor(&ctor, &[]).unwrap();
    let balance = reflect::invoke_method(&int(), &method, Some(&instance), &[]).unwrap();
    assert_eq!(balance, Value::Int(0));
}

#[test]
fn test_require_method_missing() {
    common::english();
    let account = common::shared().find_class("shop.Account").unwrap();
    let descriptor = MemberDescriptor::method(&account, "withdraw", vec![int()]);
    let (kind, message) = kind_and_message(reflect::require_method(&descriptor).unwrap_err());
    assert_eq!(kind, FailureKind::MemberNotFound);
    assert_eq!(message, "Method `withdraw(int)` not found in class `Account`.");
}

#[test]
fn test_require_method_checks_in_order() {
    common::english();
    let account = common::shared().find_class("shop.Account").unwrap();

    // wrong return type is reported before the staticness mismatch
    let descriptor = MemberDescriptor::method(&account, "opened", vec![])
        .with_return_type(double())
        .with_static(false);
    let (kind, message) = kind_and_message(reflect::require_method(&descriptor).unwrap_err());
    assert_eq!(kind, FailureKind::AccessMismatch);
    assert_eq!(message, "Method `double opened()` in class `Account` has the wrong return type.");

    let descriptor = MemberDescriptor::method(&account, "opened", vec![])
        .with_return_type(int())
        .with_static(false)
        .with_access(AccessSet::PRIVATE);
    let (_, message) = kind_and_message(reflect::require_method(&descriptor).unwrap_err());
    assert_eq!(message, "Method `int opened()` in class `Account` should not be static.");

    let descriptor = MemberDescriptor::method(&account, "getBalance", vec![])
        .with_return_type(int())
        .with_static(true);
    let (_, message) = kind_and_message(reflect::require_method(&descriptor).unwrap_err());
    assert_eq!(message, "Method `int getBalance()` in class `Account` should be static.");

    let descriptor = MemberDescriptor::method(&account, "getBalance", vec![])
        .with_access(AccessSet::PRIVATE | AccessSet::PROTECTED);
    let (_, message) = kind_and_message(reflect::require_method(&descriptor).unwrap_err());
    assert_eq!(
        message,
        "Method `getBalance()` in class `Account` should be protected/private."
    );
}

#[test]
fn test_require_method_access_levels() {
    let account = common::shared().find_class("shop.Account").unwrap();
    let check = |name: &str, params: Vec<Type>, access: AccessSet| {
        reflect::require_method(&MemberDescriptor::method(&account, name, params).with_access(access))
    };
    assert!(check("audit", vec![], AccessSet::PROTECTED).is_ok());
    assert!(check("peek", vec![], AccessSet::PACKAGE_PRIVATE).is_ok());
    assert!(check("deposit", vec![int()], AccessSet::PUBLIC | AccessSet::PRIVATE).is_ok());
    assert!(check("peek", vec![], AccessSet::PUBLIC).is_err());
}

#[test]
fn test_private_method_is_callable_after_lookup() {
    let reflector = common::reflector();
    let account = reflector.find_class("shop.Account").unwrap();
    let ctor = reflect::require_constructor(&MemberDescriptor::constructor(&account, vec![int()]))
        .unwrap();
    let instance = reflect::invoke_constructor(&ctor, &[Value::Int(42)]).unwrap();

    let peek = reflect::require_method(&MemberDescriptor::method(&account, "peek", vec![])).unwrap();
    let value = reflect::invoke_method(&int(), &peek, Some(&instance), &[]).unwrap();
    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_require_constructor() {
    common::english();
    let account = common::shared().find_class("shop.Account").unwrap();

    let missing = MemberDescriptor::constructor(&account, vec![double()]);
    let (kind, message) = kind_and_message(reflect::require_constructor(&missing).unwrap_err());
    assert_eq!(kind, FailureKind::MemberNotFound);
    assert_eq!(message, "Constructor `Account(double)` not found.");

    let private = MemberDescriptor::constructor(&account, vec![]).with_access(AccessSet::PUBLIC);
    let (kind, message) = kind_and_message(reflect::require_constructor(&private).unwrap_err());
    assert_eq!(kind, FailureKind::AccessMismatch);
    assert_eq!(message, "Constructor `Account()` should be public.");

    // the private constructor is still usable once found
    let ctor = reflect::require_constructor(&MemberDescriptor::constructor(&account, vec![]))
        .unwrap();
    let instance = reflect::invoke_constructor(&ctor, &[]).unwrap();
    assert_eq!(instance.class().unwrap().name(), "shop.Account");
}

#[test]
fn test_require_constructor_with_method_descriptor_is_misuse() {
    let account = common::shared().find_class("shop.Account").unwrap();
    let err = reflect::require_constructor(&MemberDescriptor::method(&account, "peek", vec![]))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Misuse);
    let err = reflect::require_method(&MemberDescriptor::constructor(&account, vec![])).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Misuse);
}

#[test]
fn test_require_class_access() {
    common::english();
    let reflector = common::reflector();
    let hidden = reflector.find_class("shop.Hidden").unwrap();
    assert!(reflect::require_class_access(&hidden, AccessSet::PACKAGE_PRIVATE).is_ok());

    let (kind, message) =
        kind_and_message(reflect::require_class_access(&hidden, AccessSet::PUBLIC).unwrap_err());
    assert_eq!(kind, FailureKind::AccessMismatch);
    assert_eq!(message, "Class `shop.Hidden` should be public.");

    let account = reflector.find_class("shop.Account").unwrap();
    assert!(reflect::require_class_access(&account, AccessSet::PUBLIC).is_ok());
}

#[test]
fn test_invoke_method_checks_result() {
    common::english();
    let account = common::shared().find_class("shop.Account").unwrap();
    let ctor = reflect::require_constructor(&MemberDescriptor::constructor(&account, vec![int()]))
        .unwrap();
    let instance = reflect::invoke_constructor(&ctor, &[Value::Int(5)]).unwrap();

    let get_balance =
        reflect::require_method(&MemberDescriptor::method(&account, "getBalance", vec![])).unwrap();
    let (kind, message) = kind_and_message(
        reflect::invoke_method(&Type::Void, &get_balance, Some(&instance), &[]).unwrap_err(),
    );
    assert_eq!(kind, FailureKind::AccessMismatch);
    assert_eq!(message, "Method `int getBalance()` in class `Account` should not return anything.");

    let (kind, message) = kind_and_message(
        reflect::invoke_method(&string(), &get_balance, Some(&instance), &[]).unwrap_err(),
    );
    assert_eq!(kind, FailureKind::AccessMismatch);
    assert_eq!(message, "Method `int getBalance()` in class `Account` has the wrong return type.");

    // a void method satisfies a void expectation
    let deposit =
        reflect::require_method(&MemberDescriptor::method(&account, "deposit", vec![int()]))
            .unwrap();
    let result = reflect::invoke_method(&Type::Void, &deposit, Some(&instance), &[Value::Int(3)]);
    assert_eq!(result.unwrap(), Value::Void);
    let balance = reflect::invoke_method(&int(), &get_balance, Some(&instance), &[]).unwrap();
    assert_eq!(balance, Value::Int(8));

    // null satisfies any reference expectation
    let nothing =
        reflect::require_method(&MemberDescriptor::method(&account, "nothing", vec![])).unwrap();
    let value = reflect::invoke_method(&string(), &nothing, Some(&instance), &[]).unwrap();
    assert!(value.is_null());
}

#[test]
fn test_invoke_method_with_bad_arguments() {
    common::english();
    let account = common::shared().find_class("shop.Account").unwrap();
    let get_balance =
        reflect::require_method(&MemberDescriptor::method(&account, "getBalance", vec![])).unwrap();
    let (kind, message) =
        kind_and_message(reflect::invoke_method(&int(), &get_balance, None, &[]).unwrap_err());
    assert_eq!(kind, FailureKind::InvocationFailure);
    assert_eq!(
        message,
        "Method `int getBalance()` in class `Account` was called with incorrect parameters."
    );
}

#[test]
fn test_fault_from_invoked_code_is_propagated() {
    let thrower = common::shared().find_class("shop.Thrower").unwrap();
    let check =
        reflect::require_method(&MemberDescriptor::method(&thrower, "check", vec![int()])).unwrap();
    let err = reflect::invoke_method(&int(), &check, None, &[Value::Int(5)]).unwrap_err();
    assert_eq!(err.kind(), FailureKind::PropagatedFault);

    let fault = err.fault().unwrap();
    assert_eq!(fault.type_name(), kinds::ILLEGAL_STATE);
    assert_eq!(fault.message(), Some("bad value."));
    assert!(fault
        .stack()
        .iter()
        .any(|frame| frame.class == "shop.Thrower" && frame.method == "check"));
}

#[test]
fn test_fault_message_from_argument() {
    let thrower = common::shared().find_class("shop.Thrower").unwrap();
    let fail =
        reflect::require_method(&MemberDescriptor::method(&thrower, "fail", vec![string()])).unwrap();
    let err =
        reflect::invoke_method(&Type::Void, &fail, None, &[Value::str("custom text")]).unwrap_err();
    assert_eq!(err.fault().unwrap().message(), Some("custom text"));
}

#[test]
fn test_abstract_class_cannot_be_instantiated() {
    common::english();
    let template = common::shared().find_class("shop.Template").unwrap();
    let ctor = reflect::require_constructor(&MemberDescriptor::constructor(&template, vec![]))
        .unwrap();
    let (kind, message) = kind_and_message(reflect::invoke_constructor(&ctor, &[]).unwrap_err());
    assert_eq!(kind, FailureKind::InvocationFailure);
    assert_eq!(message, "Cannot create an instance of the abstract class `Template`.");
}

#[test]
fn test_failed_static_initializer() {
    let reflector = common::reflector();
    let class = reflector.find_class("shop.FaultyInit").unwrap();
    let get = reflect::require_method(&MemberDescriptor::method(&class, "get", vec![])).unwrap();

    let first = reflect::invoke_method(&int(), &get, None, &[]).unwrap_err();
    let fault = first.fault().unwrap();
    assert_eq!(fault.type_name(), kinds::ILLEGAL_STATE);
    assert_eq!(fault.message(), Some("init failed"));

    let second = reflect::invoke_method(&int(), &get, None, &[]).unwrap_err();
    let fault = second.fault().unwrap();
    assert_eq!(fault.type_name(), kinds::NO_CLASS_DEF);
    assert_eq!(fault.message(), Some("Could not initialize class shop.FaultyInit"));

    // a fresh copy runs its initializer again
    let fresh = reflector.new_instance_of(&class).unwrap();
    let get = reflect::require_method(&MemberDescriptor::method(&fresh, "get", vec![])).unwrap();
    let err = reflect::invoke_method(&int(), &get, None, &[]).unwrap_err();
    assert_eq!(err.fault().unwrap().message(), Some("init failed"));
}

#[test]
fn test_get_nice_exception() {
    common::english();
    let thrower = common::shared().find_class("shop.Thrower").unwrap();
    let check =
        reflect::require_method(&MemberDescriptor::method(&thrower, "check", vec![int()])).unwrap();
    let args = [Value::Int(5)];
    let err = reflect::invoke_method(&int(), &check, None, &args).unwrap_err();
    let fault = err.fault().unwrap();

    let nice = get_nice_exception(fault, "check", &args, Some("Try again."));
    assert_eq!(nice.kind(), FailureKind::WrappedFault);
    assert_eq!(
        nice.message(),
        "IllegalStateException: bad value, when calling check(5). Try again."
    );
    let diagnostic = nice.as_diagnostic().unwrap();
    assert_eq!(diagnostic.call(), Some("check(5)"));
    assert_eq!(diagnostic.custom(), Some("Try again."));
    assert_eq!(diagnostic.stack(), fault.stack());
    // the diagnostic replaces the fault, so it takes over the fault's cause
    assert!(fault.cause().is_none());
    assert!(diagnostic.cause().is_none());

    let plain = get_nice_exception(fault, "check", &args, None);
    assert_eq!(plain.message(), "IllegalStateException: bad value, when calling check(5).");
}

#[test]
fn test_nice_exception_keeps_cause_chain() {
    common::english();
    let thrower = common::shared().find_class("shop.Thrower").unwrap();
    let check =
        reflect::require_method(&MemberDescriptor::method(&thrower, "check", vec![int()])).unwrap();
    let args = [Value::Int(5)];
    let err = reflect::invoke_method(&int(), &check, None, &args).unwrap_err();
    let thrown = err.fault().unwrap();

    let root = Fault::with_message(kinds::ILLEGAL_STATE, "ledger closed");
    let cause = Fault::caused_by(kinds::ILLEGAL_ARGUMENT, Some("negative amount".into()), root.clone());
    let fault = thrown.rebuild(Some("rejected".into()), Some(cause.clone()));

    let nice = get_nice_exception(&fault, "check", &args, None);
    assert_eq!(nice.message(), "IllegalStateException: rejected, when calling check(5).");
    let diagnostic = nice.as_diagnostic().unwrap();
    assert!(!fault.stack().is_empty());
    assert_eq!(diagnostic.stack(), fault.stack());
    let kept = diagnostic.cause().unwrap();
    assert!(Fault::ptr_eq(kept, &cause));
    assert_eq!(kept.message(), Some("negative amount"));
    assert!(Fault::ptr_eq(kept.cause().unwrap(), &root));
    assert!(root.cause().is_none());
}

#[test]
fn test_nice_exception_describes_objects() {
    common::english();
    let account = common::shared().find_class("shop.Account").unwrap();
    let ctor = reflect::require_constructor(&MemberDescriptor::constructor(&account, vec![int()]))
        .unwrap();
    let instance = reflect::invoke_constructor(&ctor, &[Value::Int(7)]).unwrap();

    let fault = Fault::new(kinds::ARITHMETIC, None);
    let nice = get_nice_exception(&fault, "merge", &[instance, Value::str("a")], None);
    assert_eq!(nice.message(), "ArithmeticException, when calling merge(Account(7), \"a\").");
}

#[test]
fn test_primitive_long_maps_to_boxed_long() {
    let long = primitive_type_to_object_type(&Type::Primitive(PrimitiveType::Long));
    assert_eq!(long.name(), "lang.Long");
    assert!(long.is_instance(&Value::Long(3)));
    assert!(!long.is_instance(&Value::Float(3.0)));
}

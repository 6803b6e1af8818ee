//! Signatures and call renditions for diagnostics

use super::error::{Diagnostic, ReflectError};
use crate::messages::{keys, tr};
use edutest_bytecode::TypeDesc;
use edutest_core::{builtins, Constructor, Fault, Method, Type, Value};

const MAX_ARG_LENGTH: usize = 50;

/// Boxed class of a primitive type; other types are returned unchanged
pub fn primitive_type_to_object_type(ty: &Type) -> Type {
    match ty {
        Type::Primitive(kind) => Type::Class(builtins::boxed(*kind)),
        other => other.clone(),
    }
}

fn param_list<'a>(params: impl Iterator<Item = &'a str>) -> String {
    params.collect::<Vec<_>>().join(", ")
}

/// `"int getX(String)"`, or `"getX(String)"` without a return type
pub fn nice_method_signature(return_type: Option<&Type>, name: &str, params: &[Type]) -> String {
    let names: Vec<String> = params.iter().map(Type::simple_name).collect();
    let params = param_list(names.iter().map(String::as_str));
    match return_type {
        Some(ret) => format!("{} {}({})", ret.simple_name(), name, params),
        None => format!("{}({})", name, params),
    }
}

fn desc_simple_name(desc: &TypeDesc) -> &str {
    match desc {
        TypeDesc::Void => "void",
        TypeDesc::Primitive(kind) => kind.name(),
        TypeDesc::Class(name) => edutest_bytecode::simple_name(name),
    }
}

/// Declared signature of a method handle, `"int getX(String)"`
pub fn method_signature(method: &Method) -> String {
    format!(
        "{} {}({})",
        desc_simple_name(method.return_desc()),
        method.name(),
        param_list(method.parameter_descs().iter().map(desc_simple_name))
    )
}

/// Declared signature of a constructor handle, `"Point(int, int)"`
pub fn nice_constructor_signature(ctor: &Constructor) -> String {
    format!(
        "{}({})",
        ctor.declaring_class().simple_name(),
        param_list(ctor.parameter_descs().iter().map(desc_simple_name))
    )
}

fn strip_punctuation(message: &str) -> &str {
    let message = message.trim();
    message
        .strip_suffix(['.', '!', '?'])
        .unwrap_or(message)
}

fn describe_arg(arg: &Value) -> String {
    let mut text = match arg.to_display_string() {
        Ok(text) => text,
        Err(_) => tr(keys::ARG_TO_STRING_FAILED, &[]),
    };
    if let Some((cut, _)) = text.char_indices().nth(MAX_ARG_LENGTH) {
        text.truncate(cut);
        text.push_str("...");
    }
    if arg.as_str().is_some() {
        text = format!("\"{}\"", text);
    }
    text
}

/// `"name(1, \"two\")"`
pub fn describe_call(method_name: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(describe_arg).collect();
    format!("{}({})", method_name, args.join(", "))
}

/// Turn a fault raised by `method_name(args)` into a diagnostic
///
/// The message names the fault's type and message, the call and the
/// optional `custom` note. The fault's stack trace and cause are kept.
pub fn get_nice_exception(
    original: &Fault,
    method_name: &str,
    args: &[Value],
    custom: Option<&str>,
) -> ReflectError {
    let fault_text = match original.message() {
        Some(message) => format!("{}: {}", original.simple_name(), strip_punctuation(message)),
        None => original.simple_name().to_string(),
    };
    let call = describe_call(method_name, args);
    let custom = custom.filter(|c| !c.is_empty());
    let message = match custom {
        Some(custom) => tr(keys::EXCEPTION_WITH_CUSTOM_MSG, &[fault_text.as_str(), call.as_str(), custom]),
        None => tr(keys::EXCEPTION_WITHOUT_CUSTOM_MSG, &[fault_text.as_str(), call.as_str()]),
    };
    ReflectError::Diagnostic(Diagnostic::wrapping(
        message,
        call,
        custom.map(str::to_string),
        original,
    ))
}

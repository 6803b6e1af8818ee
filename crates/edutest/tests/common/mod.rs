//! Class fixtures shared by the integration tests

#![allow(dead_code)]

use edutest::bytecode::{access, ClassBuilder, ClassFile, MethodSig, Opcode, PrimitiveType, TypeDesc};
use edutest::runtime::{BytecodeLoader, LoadingContext, MemoryClassPath};
use edutest::{locale, Locale, Reflector};
use once_cell::sync::Lazy;
use std::sync::Arc;

static SHARED: Lazy<Reflector> = Lazy::new(reflector);

pub const PUBLIC_STATIC: u16 = access::PUBLIC | access::STATIC;

pub fn int() -> TypeDesc {
    TypeDesc::Primitive(PrimitiveType::Int)
}

pub fn double() -> TypeDesc {
    TypeDesc::Primitive(PrimitiveType::Double)
}

pub fn account() -> ClassFile {
    ClassBuilder::new("shop.Account")
        .field("balance", access::PRIVATE, int())
        .field("opened", access::PRIVATE | access::STATIC, int())
        .method(MethodSig::static_init(), |c| {
            c.const_i32(0).put_static("opened").op(Opcode::ReturnVoid);
        })
        .method(MethodSig::constructor(access::PUBLIC).param(int()), |c| {
            c.load(0).load(1).put_field("balance");
            c.get_static("opened").const_i32(1).op(Opcode::Add).put_static("opened");
            c.op(Opcode::ReturnVoid);
        })
        .method(MethodSig::constructor(access::PRIVATE), |c| {
            c.op(Opcode::ReturnVoid);
        })
        .method(MethodSig::new("getBalance", access::PUBLIC).returns(int()), |c| {
            c.load(0).get_field("balance").op(Opcode::Return);
        })
        .method(MethodSig::new("deposit", access::PUBLIC).param(int()), |c| {
            let ok = c.label();
            c.load(1).const_i32(0).op(Opcode::Lt).jump(Opcode::JmpIfFalse, ok);
            c.throw_msg("lang.IllegalArgumentException", "Amount must be positive.");
            c.bind(ok);
            c.load(0).load(0).get_field("balance").load(1).op(Opcode::Add);
            c.put_field("balance").op(Opcode::ReturnVoid);
        })
        .method(MethodSig::new("audit", access::PROTECTED), |c| {
            c.op(Opcode::ReturnVoid);
        })
        .method(MethodSig::new("peek", 0).returns(int()), |c| {
            c.load(0).get_field("balance").op(Opcode::Return);
        })
        .method(MethodSig::new("opened", PUBLIC_STATIC).returns(int()), |c| {
            c.get_static("opened").op(Opcode::Return);
        })
        .method(
            MethodSig::new("nothing", access::PUBLIC).returns(TypeDesc::class("lang.Object")),
            |c| {
                c.const_null().op(Opcode::Return);
            },
        )
        .method(MethodSig::new("toString", access::PUBLIC).returns(TypeDesc::string()), |c| {
            c.const_str("Account(").load(0).get_field("balance").op(Opcode::Concat);
            c.const_str(")").op(Opcode::Concat).op(Opcode::Return);
        })
        .build()
}

pub fn savings() -> ClassFile {
    ClassBuilder::new("shop.Savings")
        .extends("shop.Account")
        .method(MethodSig::constructor(access::PUBLIC), |c| {
            c.op(Opcode::ReturnVoid);
        })
        .method(MethodSig::new("rate", access::PUBLIC).returns(double()), |c| {
            c.const_f64(0.5).op(Opcode::Return);
        })
        .build()
}

pub fn hidden() -> ClassFile {
    ClassBuilder::new("shop.Hidden").access(0).build()
}

pub fn template() -> ClassFile {
    ClassBuilder::new("shop.Template")
        .access(access::PUBLIC | access::ABSTRACT)
        .method(MethodSig::constructor(access::PUBLIC), |c| {
            c.op(Opcode::ReturnVoid);
        })
        .build()
}

pub fn thrower() -> ClassFile {
    ClassBuilder::new("shop.Thrower")
        .method(MethodSig::new("fail", PUBLIC_STATIC).param(TypeDesc::string()), |c| {
            c.load(0).throw("lang.IllegalStateException");
        })
        .method(MethodSig::new("check", PUBLIC_STATIC).param(int()).returns(int()), |c| {
            c.throw_msg("lang.IllegalStateException", "bad value.");
        })
        .build()
}

pub fn faulty_init() -> ClassFile {
    ClassBuilder::new("shop.FaultyInit")
        .field("value", access::PUBLIC | access::STATIC, int())
        .method(MethodSig::static_init(), |c| {
            c.throw_msg("lang.IllegalStateException", "init failed");
        })
        .method(MethodSig::new("get", PUBLIC_STATIC).returns(int()), |c| {
            c.get_static("value").op(Opcode::Return);
        })
        .build()
}

pub fn spinner() -> ClassFile {
    ClassBuilder::new("shop.Spinner")
        .method(MethodSig::new("spin", PUBLIC_STATIC), |c| {
            let top = c.label();
            c.bind(top).jump(Opcode::Jmp, top);
        })
        .build()
}

pub fn classpath() -> MemoryClassPath {
    let cp = MemoryClassPath::new();
    for class in [
        account(),
        savings(),
        hidden(),
        template(),
        thrower(),
        faulty_init(),
        spinner(),
    ] {
        cp.insert_class(&class);
    }
    cp
}

pub fn root() -> Arc<LoadingContext> {
    LoadingContext::root(BytecodeLoader::new(classpath()))
}

pub fn reflector() -> Reflector {
    Reflector::new(root())
}

/// Reflector kept alive for the whole test binary; its classes share static state
pub fn shared() -> &'static Reflector {
    &SHARED
}

/// Pin English messages for tests that compare message text
pub fn english() {
    locale::set(Locale::english());
}

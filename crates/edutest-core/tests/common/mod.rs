//! Shared class fixtures for the integration tests

#![allow(dead_code)]

use edutest_bytecode::{access, ClassBuilder, ClassFile, MethodSig, Opcode, PrimitiveType, TypeDesc};
use edutest_core::{BytecodeLoader, LoadingContext, MemoryClassPath, NativeRegistry, Value};
use std::sync::Arc;

pub const PUBLIC_STATIC: u16 = access::PUBLIC | access::STATIC;

pub fn int() -> TypeDesc {
    TypeDesc::Primitive(PrimitiveType::Int)
}

pub fn long() -> TypeDesc {
    TypeDesc::Primitive(PrimitiveType::Long)
}

pub fn double() -> TypeDesc {
    TypeDesc::Primitive(PrimitiveType::Double)
}

pub fn counter() -> ClassFile {
    ClassBuilder::new("demo.Counter")
        .field("count", access::PRIVATE | access::STATIC, int())
        .method(MethodSig::static_init(), |c| {
            c.const_i32(0).put_static("count").op(Opcode::ReturnVoid);
        })
        .method(MethodSig::new("increment", PUBLIC_STATIC).returns(int()), |c| {
            c.get_static("count").const_i32(1).op(Opcode::Add);
            c.op(Opcode::Dup).put_static("count").op(Opcode::Return);
        })
        .build()
}

pub fn helper() -> ClassFile {
    ClassBuilder::new("demo.Helper")
        .method(MethodSig::new("id", access::PUBLIC).returns(int()), |c| {
            c.const_i32(7).op(Opcode::Return);
        })
        .build()
}

pub fn user() -> ClassFile {
    ClassBuilder::new("demo.User")
        .method(
            MethodSig::new("make", PUBLIC_STATIC).returns(TypeDesc::class("demo.Helper")),
            |c| {
                c.new_object("demo.Helper", 0).op(Opcode::Return);
            },
        )
        .build()
}

pub fn greeter() -> ClassFile {
    ClassBuilder::new("demo.Greeter")
        .field("name", access::PRIVATE, TypeDesc::string())
        .method(MethodSig::constructor(access::PUBLIC).param(TypeDesc::string()), |c| {
            c.load(0).load(1).put_field("name").op(Opcode::ReturnVoid);
        })
        .method(MethodSig::new("greet", access::PUBLIC).returns(TypeDesc::string()), |c| {
            c.const_str("Hello, ").load(0).get_field("name").op(Opcode::Concat);
            c.op(Opcode::Return);
        })
        .method(MethodSig::new("toString", access::PUBLIC).returns(TypeDesc::string()), |c| {
            c.const_str("Greeter(").load(0).get_field("name").op(Opcode::Concat);
            c.const_str(")").op(Opcode::Concat).op(Opcode::Return);
        })
        .method(
            MethodSig::new("create", PUBLIC_STATIC)
                .param(TypeDesc::string())
                .returns(TypeDesc::class("demo.Greeter")),
            |c| {
                c.load(0).new_object("demo.Greeter", 1).op(Opcode::Return);
            },
        )
        .build()
}

pub fn broken() -> ClassFile {
    ClassBuilder::new("demo.Broken")
        .field("value", access::PUBLIC | access::STATIC, int())
        .method(MethodSig::static_init(), |c| {
            c.throw_msg("lang.IllegalStateException", "boom");
        })
        .method(MethodSig::new("get", PUBLIC_STATIC).returns(int()), |c| {
            c.get_static("value").op(Opcode::Return);
        })
        .build()
}

pub fn calc() -> ClassFile {
    ClassBuilder::new("demo.Calc")
        .method(
            MethodSig::new("div", PUBLIC_STATIC).params([int(), int()]).returns(int()),
            |c| {
                c.load(0).load(1).op(Opcode::Div).op(Opcode::Return);
            },
        )
        .method(
            MethodSig::new("secret", access::PRIVATE | access::STATIC).returns(int()),
            |c| {
                c.const_i32(42).op(Opcode::Return);
            },
        )
        .method(
            MethodSig::new("identity", PUBLIC_STATIC).param(long()).returns(long()),
            |c| {
                c.load(0).op(Opcode::Return);
            },
        )
        .method(MethodSig::new("recurse", PUBLIC_STATIC).returns(int()), |c| {
            c.invoke_static("recurse", 0).op(Opcode::Return);
        })
        .method(MethodSig::new("spin", PUBLIC_STATIC), |c| {
            let top = c.label();
            c.bind(top).jump(Opcode::Jmp, top);
        })
        .method(
            MethodSig::new("sum", PUBLIC_STATIC).param(int()).returns(int()),
            |c| {
                let top = c.label();
                let end = c.label();
                c.const_i32(0).store(1).const_i32(1).store(2);
                c.bind(top).load(2).load(0).op(Opcode::Le).jump(Opcode::JmpIfFalse, end);
                c.load(1).load(2).op(Opcode::Add).store(1);
                c.load(2).const_i32(1).op(Opcode::Add).store(2);
                c.jump(Opcode::Jmp, top);
                c.bind(end).load(1).op(Opcode::Return);
            },
        )
        .method(
            MethodSig::new("describe", PUBLIC_STATIC)
                .param(int())
                .returns(TypeDesc::string()),
            |c| {
                c.const_str("n=").load(0).op(Opcode::Concat).op(Opcode::Return);
            },
        )
        .build()
}

pub fn shape() -> ClassFile {
    ClassBuilder::new("demo.Shape")
        .access(access::PUBLIC | access::ABSTRACT)
        .abstract_method(MethodSig::new("area", access::PUBLIC).returns(double()))
        .build()
}

pub fn square() -> ClassFile {
    ClassBuilder::new("demo.Square")
        .extends("demo.Shape")
        .field("side", access::PRIVATE, double())
        .method(MethodSig::constructor(access::PUBLIC).param(double()), |c| {
            c.load(0).load(1).put_field("side").op(Opcode::ReturnVoid);
        })
        .method(MethodSig::new("area", access::PUBLIC).returns(double()), |c| {
            c.load(0).get_field("side").load(0).get_field("side");
            c.op(Opcode::Mul).op(Opcode::Return);
        })
        .build()
}

pub fn native() -> ClassFile {
    ClassBuilder::new("demo.Native")
        .native_method(
            MethodSig::new("twice", PUBLIC_STATIC).param(int()).returns(int()),
            "demo.twice",
        )
        .build()
}

pub fn natives() -> NativeRegistry {
    NativeRegistry::new().with("demo.twice", |call| {
        Ok(Value::Int(call.int_arg(0)?.wrapping_mul(2)))
    })
}

pub fn classpath() -> MemoryClassPath {
    let cp = MemoryClassPath::new();
    for class in [
        counter(),
        helper(),
        user(),
        greeter(),
        broken(),
        calc(),
        shape(),
        square(),
        native(),
    ] {
        cp.insert_class(&class);
    }
    cp
}

pub fn root() -> Arc<LoadingContext> {
    LoadingContext::root(BytecodeLoader::new(classpath()).with_natives(natives()))
}

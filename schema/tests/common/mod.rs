//! Message types shared by the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use strata_schema::{
    EnumInfo, FieldInfo, FieldType, Message, MessageType, SchemaBuilder, Syntax, Value,
};

pub static COLOR: EnumInfo = EnumInfo::closed("test.Color", &[0, 1, 2]);
pub static LEVEL: EnumInfo = EnumInfo::open("test.Level", &[0, 1, 2]);

pub static CHILD: MessageType = MessageType::new("test.Child", || {
    SchemaBuilder::new("test.Child", Syntax::Proto2)
        .field(FieldInfo::new("id", 1, FieldType::Int32).required())
        .field(FieldInfo::new("name", 2, FieldType::String))
        .field(FieldInfo::new("child", 3, FieldType::Message).message(&CHILD))
});

pub static GROUP: MessageType = MessageType::new("test.Container.Group", || {
    SchemaBuilder::new("test.Container.Group", Syntax::Proto2)
        .field(FieldInfo::new("value", 1, FieldType::Int32))
        .field(FieldInfo::new("tags", 2, FieldType::String).repeated())
});

pub static SCALARS: MessageType = MessageType::new("test.Scalars", || {
    SchemaBuilder::new("test.Scalars", Syntax::Proto2)
        .field(FieldInfo::new("f_double", 1, FieldType::Double))
        .field(FieldInfo::new("f_float", 2, FieldType::Float))
        .field(FieldInfo::new("f_int64", 3, FieldType::Int64))
        .field(FieldInfo::new("f_uint64", 4, FieldType::Uint64))
        .field(FieldInfo::new("f_int32", 5, FieldType::Int32))
        .field(FieldInfo::new("f_fixed64", 6, FieldType::Fixed64))
        .field(FieldInfo::new("f_fixed32", 7, FieldType::Fixed32))
        .field(FieldInfo::new("f_bool", 8, FieldType::Bool))
        .field(FieldInfo::new("f_string", 9, FieldType::String))
        .field(FieldInfo::new("f_bytes", 10, FieldType::Bytes))
        .field(FieldInfo::new("f_uint32", 11, FieldType::Uint32))
        .field(FieldInfo::new("f_enum", 12, FieldType::Enum).enumeration(&COLOR))
        .field(FieldInfo::new("f_sfixed32", 13, FieldType::Sfixed32))
        .field(FieldInfo::new("f_sfixed64", 14, FieldType::Sfixed64))
        .field(FieldInfo::new("f_sint32", 15, FieldType::Sint32))
        .field(FieldInfo::new("f_sint64", 16, FieldType::Sint64))
        .field(FieldInfo::new("f_default", 17, FieldType::Int32).default_value(7))
});

pub static CONTAINER: MessageType = MessageType::new("test.Container", || {
    SchemaBuilder::new("test.Container", Syntax::Proto2)
        .field(FieldInfo::new("child", 1, FieldType::Message).message(&CHILD))
        .field(
            FieldInfo::new("children", 2, FieldType::Message)
                .repeated()
                .message(&CHILD),
        )
        .field(FieldInfo::new("group", 3, FieldType::Group).message(&GROUP))
        .field(FieldInfo::map("counts", 4, FieldType::String, FieldType::Int32))
        .field(FieldInfo::map("by_id", 5, FieldType::Int32, FieldType::Message).message(&CHILD))
        .field(FieldInfo::map("colors", 6, FieldType::String, FieldType::Enum).enumeration(&COLOR))
        .field(FieldInfo::new("color", 7, FieldType::Enum).enumeration(&COLOR))
        .field(
            FieldInfo::new("color_list", 8, FieldType::Enum)
                .repeated()
                .enumeration(&COLOR),
        )
        .field(
            FieldInfo::new("packed_colors", 9, FieldType::Enum)
                .repeated()
                .packed(true)
                .enumeration(&COLOR),
        )
        .field(
            FieldInfo::new("numbers", 10, FieldType::Int32)
                .repeated()
                .packed(true),
        )
        .field(FieldInfo::new("name", 11, FieldType::String).oneof("choice"))
        .field(FieldInfo::new("id", 12, FieldType::Int64).oneof("choice"))
        .field(
            FieldInfo::new("detail", 13, FieldType::Message)
                .oneof("choice")
                .message(&CHILD),
        )
        .field(
            FieldInfo::new("lazy_child", 14, FieldType::Message)
                .lazy()
                .message(&CHILD),
        )
        .extensions(100..=199)
});

pub static PROTO3: MessageType = MessageType::new("test.Proto3", || {
    SchemaBuilder::new("test.Proto3", Syntax::Proto3)
        .field(FieldInfo::new("count", 1, FieldType::Int32))
        .field(FieldInfo::new("label", 2, FieldType::String))
        .field(FieldInfo::new("values", 3, FieldType::Sint64).repeated())
        .field(FieldInfo::new("level", 4, FieldType::Enum).enumeration(&LEVEL))
        .field(FieldInfo::new("maybe", 5, FieldType::Int32).optional())
        .field(FieldInfo::new("ratio", 6, FieldType::Double))
});

/// Builds a child with `id` and `name` set.
pub fn child(id: i32, name: &str) -> Message {
    let mut builder = CHILD.builder().unwrap();
    builder.set("id", id).unwrap().set("name", name).unwrap();
    builder.build()
}

/// Builds a child nested `depth` levels deep (a depth of 1 has no children).
pub fn chain(depth: usize) -> Message {
    let mut message = child(depth as i32, "leaf");
    for level in (1..depth).rev() {
        let mut builder = CHILD.builder().unwrap();
        builder
            .set("id", level as i32)
            .unwrap()
            .set("child", message)
            .unwrap();
        message = builder.build();
    }
    message
}

/// Builds a container with every kind of field set.
pub fn sample_container() -> Message {
    let mut group = GROUP.builder().unwrap();
    group
        .set("value", 17)
        .unwrap()
        .push("tags", "x")
        .unwrap()
        .push("tags", "y")
        .unwrap();

    let mut builder = CONTAINER.builder().unwrap();
    builder
        .set("child", child(1, "first"))
        .unwrap()
        .push("children", child(2, "second"))
        .unwrap()
        .push("children", child(3, "third"))
        .unwrap()
        .set("group", group.build())
        .unwrap()
        .insert("counts", "apples", 3)
        .unwrap()
        .insert("counts", "pears", -1)
        .unwrap()
        .insert("by_id", 7, child(7, "seventh"))
        .unwrap()
        .insert("colors", "sky", Value::Enum(2))
        .unwrap()
        .set("color", Value::Enum(1))
        .unwrap()
        .push("color_list", Value::Enum(2))
        .unwrap()
        .push("packed_colors", Value::Enum(0))
        .unwrap()
        .push("packed_colors", Value::Enum(1))
        .unwrap()
        .set("id", 1_i64 << 40)
        .unwrap()
        .set("lazy_child", child(14, "lazy"))
        .unwrap();
    for n in [1, -1, 300, i32::MAX] {
        builder.push("numbers", n).unwrap();
    }
    builder.build()
}

/// Encodes fields written by `f`.
pub fn encode(f: impl FnOnce(&mut Vec<u8>)) -> Bytes {
    let mut buf = Vec::new();
    f(&mut buf);
    Bytes::from(buf)
}

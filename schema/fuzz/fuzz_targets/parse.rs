#![no_main]

use arbitrary::Arbitrary;
use bytes::{Buf, Bytes};
use libfuzzer_sys::fuzz_target;
use strata_schema::{
    EnumInfo, FieldInfo, FieldType, MessageType, ParseOptions, SchemaBuilder, Syntax,
};

static KIND: EnumInfo = EnumInfo::closed("fuzz.Kind", &[0, 1, 2]);

static NODE: MessageType = MessageType::new("fuzz.Node", || {
    SchemaBuilder::new("fuzz.Node", Syntax::Proto2)
        .field(FieldInfo::new("id", 1, FieldType::Sint64))
        .field(FieldInfo::new("name", 2, FieldType::String))
        .field(FieldInfo::new("child", 3, FieldType::Message).message(&NODE))
        .field(
            FieldInfo::new("children", 4, FieldType::Message)
                .repeated()
                .message(&NODE),
        )
        .field(FieldInfo::new("group", 5, FieldType::Group).message(&NODE))
        .field(
            FieldInfo::new("kinds", 6, FieldType::Enum)
                .repeated()
                .packed(true)
                .enumeration(&KIND),
        )
        .field(FieldInfo::map("index", 7, FieldType::Int32, FieldType::Message).message(&NODE))
        .field(FieldInfo::new("lazy", 8, FieldType::Message).lazy().message(&NODE))
        .field(FieldInfo::new("small", 9, FieldType::Fixed32).oneof("pick"))
        .field(FieldInfo::new("large", 10, FieldType::Double).oneof("pick"))
        .extensions(100..=199)
});

#[derive(Arbitrary, Debug)]
struct Input {
    data: Vec<u8>,
    recursion_limit: u8,
    lazy: bool,
    discard_unknown: bool,
    split: usize,
}

fuzz_target!(|input: Input| {
    let data = Bytes::from(input.data);
    let options = ParseOptions {
        recursion_limit: input.recursion_limit as usize,
        lazy: input.lazy,
        discard_unknown: input.discard_unknown,
        ..Default::default()
    };

    // Contiguous and streamed parses must agree, whether the stream arrives in one piece or two.
    let array = NODE.parse_with(&data, &options);
    let stream = NODE.parse_from(data.clone(), &options);
    assert_eq!(array, stream);
    let split = input.split % (data.len() + 1);
    let chained = NODE.parse_from(data.slice(..split).chain(data.slice(split..)), &options);
    assert_eq!(array, chained);

    // Anything that parsed must serialize to something that parses back to it.
    if let Ok(message) = array {
        let encoded = message.to_bytes();
        assert_eq!(encoded.len(), message.encoded_len());
        let reparsed = NODE.parse_with(&encoded, &options).expect("reparse");
        assert_eq!(reparsed, message);
        assert_eq!(reparsed.to_bytes(), encoded);
    }
});

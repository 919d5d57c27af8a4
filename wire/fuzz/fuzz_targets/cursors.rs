#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use strata_wire::{
    decode::{self, Registers},
    reader::Reader,
    utf8, Error,
};

#[derive(Arbitrary, Debug)]
struct Input {
    data: Vec<u8>,
    recursion_limit: u8,
    split: usize,
}

fn skip_array(data: &Bytes, regs: &mut Registers) -> Result<usize, Error> {
    let mut pos = 0;
    let mut fields = 0;
    while pos < data.len() {
        let (tag, next) = decode::decode_tag(data, pos)?;
        pos = decode::skip_field(data, next, tag, regs)?;
        fields += 1;
    }
    Ok(fields)
}

fn skip_stream<B: bytes::Buf>(reader: &mut Reader<B>) -> Result<usize, Error> {
    let mut fields = 0;
    while let Some(tag) = reader.read_tag()? {
        reader.skip_field(tag)?;
        fields += 1;
    }
    Ok(fields)
}

fuzz_target!(|input: Input| {
    let data = Bytes::from(input.data);
    let limit = input.recursion_limit as usize;

    // Both cursors must agree, whether the input arrives in one piece or two.
    let mut regs = Registers::new(limit);
    let array = skip_array(&data, &mut regs);
    let stream = skip_stream(&mut Reader::with_recursion_limit(data.clone(), limit));
    assert_eq!(array, stream);

    let split = input.split % (data.len() + 1);
    let chained = bytes::Buf::chain(data.slice(..split), data.slice(split..));
    let chained = skip_stream(&mut Reader::with_recursion_limit(chained, limit));
    assert_eq!(array, chained);

    // Both validators must agree with the standard library.
    let expected = std::str::from_utf8(&data).is_ok();
    assert_eq!(utf8::portable::is_valid(&data), expected);
    assert_eq!(utf8::fast::is_valid(&data), expected);
    let state = utf8::portable::partial(utf8::State::START, &data[..split]);
    assert_eq!(utf8::portable::partial(state, &data[split..]).is_complete(), expected);
});

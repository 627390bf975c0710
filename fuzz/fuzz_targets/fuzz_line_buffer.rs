#![no_main]

use arbitrary::Arbitrary;
use keyfind::matcher::LineBuffer;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: Input| {
    // Splitting must not depend on where chunk boundaries fall
    let mut chunked = LineBuffer::new();
    let mut lines = Vec::new();
    for chunk in &input.chunks {
        lines.extend(chunked.push(chunk));
    }
    lines.extend(chunked.finish());

    let mut whole = LineBuffer::new();
    let mut expected = whole.push(&input.chunks.concat());
    expected.extend(whole.finish());

    assert_eq!(lines, expected);
});

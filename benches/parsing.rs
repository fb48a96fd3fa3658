use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mimetree::model::raw::RawMessage;
use mimetree::parser::encoded_word;
use mimetree::parser::mime::MimeEntity;

fn bench_read_mbox(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("simple.mbox");

    c.bench_function("read_simple_mbox", |b| {
        b.iter(|| {
            mimetree::source::mbox::UnixMboxReader::open(&fixture_path)
                .unwrap()
                .count()
        })
    });
}

fn bench_decode_multipart(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("multipart.eml");
    let raw = mimetree::source::eml::read_eml(&fixture_path).unwrap();

    c.bench_function("decode_multipart_eml", |b| {
        b.iter(|| MimeEntity::parse(raw.clone()).walk().count())
    });
}

fn bench_decode_large_multipart(c: &mut Criterion) {
    let mut text = String::from("Content-Type: multipart/mixed; boundary=B\n\n");
    for i in 0..500 {
        text.push_str(&format!(
            "--B\nContent-Type: text/plain; name=\"part{i}.txt\"\n\nline one\nline two\n"
        ));
    }
    text.push_str("--B--\n");
    let raw = RawMessage::new("bench", "bench/0", text);

    c.bench_function("decode_500_parts", |b| {
        b.iter(|| MimeEntity::parse(raw.clone()).parts().len())
    });
}

fn bench_encoded_words(c: &mut Criterion) {
    let subject = "=?UTF-8?B?44GT44KM44Gv6ZW344GE6ZW344GE6ZW344GE6ZW344GE6ZW344GE5Lu2?=\r\n =?UTF-8?Q?Caf=C3=A9_con_le=C3=B1a?=";
    c.bench_function("decode_encoded_words", |b| {
        b.iter(|| encoded_word::decode(subject).unwrap())
    });
}

criterion_group!(
    benches,
    bench_read_mbox,
    bench_decode_multipart,
    bench_decode_large_multipart,
    bench_encoded_words
);
criterion_main!(benches);

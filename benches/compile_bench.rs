use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use contentmodel::{compact, Document, Element, Grammar, InsertSide, Limits, Node, Schema, Validator};

const BOOK_GRAMMAR: &str = include_str!("../tests/fixtures/book.json");
const BOOK_DOCUMENT: &str = include_str!("../tests/fixtures/book_valid.xml");

fn bench_compile(c: &mut Criterion) {
    let grammar = Grammar::from_json(BOOK_GRAMMAR).unwrap();
    let schema = Schema::from_grammar(&grammar, Limits::default()).unwrap();
    let encoded = compact::encode_to_string(&schema, false).unwrap();

    let mut group = c.benchmark_group("schema/load");
    group.bench_function("grammar", |b| {
        b.iter(|| Schema::from_grammar(black_box(&grammar), Limits::default()).unwrap());
    });
    group.bench_function("compact", |b| {
        b.iter(|| compact::decode(black_box(&encoded)).unwrap());
    });
    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let schema = Schema::from_json(BOOK_GRAMMAR, Limits::default()).unwrap();
    let doc = Document::from_string(BOOK_DOCUMENT).unwrap();

    c.bench_function("validate/book", |b| {
        b.iter(|| Validator::new(&schema).validate_document(black_box(&doc)))
    });
}

fn bench_insert_pos(c: &mut Criterion) {
    let schema = Schema::from_json(BOOK_GRAMMAR, Limits::default()).unwrap();
    let chapter = schema.element_schema("chapter").unwrap();

    let mut group = c.benchmark_group("insert_pos/chapter");
    for paras in [4usize, 32, 128] {
        let mut parent = Element::new("chapter").with_child(Element::new("title"));
        for _ in 0..paras {
            parent.push(Node::Element(Element::new("para")));
        }
        group.bench_with_input(BenchmarkId::from_parameter(paras), &parent, |b, parent| {
            b.iter(|| chapter.find_valid_pos(&parent.children, "title", InsertSide::Last))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_validate, bench_insert_pos);
criterion_main!(benches);

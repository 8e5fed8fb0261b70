use divan::{black_box, Bencher};
use markpass::{collectors, parse, Options};

fn main() {
    divan::main();
}

fn document(parts: usize) -> String {
    let mut s = String::with_capacity(parts * 160);
    for i in 0..parts {
        s.push_str(&format!("## Part {}\n\n", i));
        s.push_str(&format!(
            "Some [text](https://example.com/{}) with ![a picture](data:image/png;base64,AAAA).\n\n",
            i
        ));
        s.push_str("> - quoted\n> - list\n\n```rust\nfn main() {}\n```\n\n");
        s.push_str("| a | b |\n|---|---|\n| 1 | 2 |\n\n");
    }
    s
}

#[divan::bench(args = [10, 100, 1000])]
fn all_collectors(b: Bencher, parts: usize) {
    let s = document(parts);
    let options = Options::default();

    b.bench(|| {
        let outcome = parse(black_box(&s), collectors::all(&options), &options);
        black_box(outcome)
    });
}

#[divan::bench(args = [10, 100, 1000])]
fn links_only(b: Bencher, parts: usize) {
    let s = document(parts);
    let options = Options::default();

    b.bench(|| {
        let collectors = collectors::by_names(&["links"], &options).unwrap();
        black_box(parse(black_box(&s), collectors, &options))
    });
}

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use plainledger_core::{BalanceReport, BalanceReportOptions, JournalParser};

fn generated_journal(transactions: usize) -> String {
    let mut text = String::from("commodity $\n    format $1,000.00\n\n");
    for index in 0..transactions {
        let day = index % 28 + 1;
        let month = index / 28 % 12 + 1;
        text.push_str(&format!(
            "2011/{month:02}/{day:02} * Payee {}\n    Expenses:Category{}  ${}.{:02}\n",
            index % 50,
            index % 17,
            index % 400,
            index % 100
        ));
        text.push_str("    Assets:Bank:Checking\n\n");
    }
    text
}

fn parse_benchmark(c: &mut Criterion) {
    let text = generated_journal(5_000);
    let mut group = c.benchmark_group("journal");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("parse", |b| {
        b.iter(|| JournalParser::new().parse_journal(black_box(&text)))
    });

    let journal = JournalParser::new().parse_journal(&text).expect("generated journal parses");
    group.bench_function("balance report", |b| {
        b.iter(|| BalanceReport::build(black_box(&journal), &BalanceReportOptions::default()))
    });
    group.finish();
}

criterion_group!(benches, parse_benchmark);
criterion_main!(benches);

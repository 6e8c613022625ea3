// benches/similarity.rs
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use duty_roster::text::normalize_for_match;
use duty_roster::{LcsRatio, SequenceRatio, SimilarityMeasure};

fn address_pairs() -> Vec<(String, String)> {
    [
        ("ABOBO GARE, FACE A LA MAIRIE", "ABOBO GARE FACE MAIRIE D'ABOBO"),
        ("RIVIERA 2, CARREFOUR DU BLANC", "RIVIERA II CARREFOUR BLANC, PRES DE LA PHARMACIE"),
        ("ANGRE 8E TRANCHE, PRES DE LA BICICI", "ANGRE 8EME TRANCHE NOUVEAU CHU"),
        ("YOPOUGON SIDECI, RUE PRINCIPALE", "SIDECI ECOLE"),
    ]
    .iter()
    .map(|(a, b)| (normalize_for_match(a), normalize_for_match(b)))
    .collect()
}

fn bench_measure<S: SimilarityMeasure>(c: &mut Criterion, measure: S, pairs: &[(String, String)]) {
    c.bench_function(measure.name(), |b| {
        b.iter(|| {
            let total: f64 = pairs
                .iter()
                .map(|(x, y)| measure.ratio(black_box(x), black_box(y)))
                .sum();
            black_box(total)
        })
    });
}

fn bench_similarity(c: &mut Criterion) {
    let pairs = address_pairs();
    bench_measure(c, SequenceRatio, &pairs);
    bench_measure(c, LcsRatio, &pairs);
}

criterion_group!(benches, bench_similarity);
criterion_main!(benches);

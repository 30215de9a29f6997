use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use trafficsim_core::{
    generator::{pick_tag, poisson_sample},
    tag::TagWeight,
};

fn poisson(c: &mut Criterion) {
    let mut rng = ChaChaRng::seed_from_u64(0);
    let mut group = c.benchmark_group("poisson_sample");

    // below and above the switch to the normal approximation
    for lambda in [0.1, 10.0, 30.0, 31.0, 1_000.0] {
        group.bench_function(format!("lambda {lambda}"), |b| {
            b.iter(|| poisson_sample(black_box(lambda), &mut rng))
        });
    }

    group.finish();
}

fn tags(c: &mut Criterion) {
    let mut rng = ChaChaRng::seed_from_u64(0);
    let distribution: Vec<TagWeight> = ["browse", "search", "cart", "checkout", "account"]
        .into_iter()
        .zip([50.0, 25.0, 15.0, 5.0, 5.0])
        .map(|(tag, weight)| TagWeight::new(tag, weight))
        .collect::<Result<_, _>>()
        .unwrap();

    c.bench_function("pick_tag", |b| {
        b.iter(|| pick_tag(black_box(Some(distribution.as_slice())), &mut rng))
    });
}

criterion_group!(benches, poisson, tags);
criterion_main!(benches);

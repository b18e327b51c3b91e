use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use stockledger_core::ItemId;
use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::cache::{InMemoryStockCache, NoopStockCache};
use stockledger_infra::ledger::{LedgerEvent, StockLedger, TransactionRequest};
use stockledger_infra::store::InMemoryLedgerStore;
use stockledger_inventory::{
    Category, ItemSpec, TransactionFilter, TransactionType, UnitOfMeasure,
};
use std::sync::Arc;

type Bus = Arc<InMemoryEventBus<EventEnvelope<LedgerEvent>>>;

fn spec(sku: &str) -> ItemSpec {
    ItemSpec::new(sku, "Bench item", Category::Component, UnitOfMeasure::Piece, 10, 100).unwrap()
}

fn ledger() -> StockLedger<InMemoryLedgerStore, InMemoryStockCache, Bus> {
    StockLedger::new(
        InMemoryLedgerStore::new(),
        InMemoryStockCache::new(),
        Arc::new(InMemoryEventBus::new()),
    )
}

fn bench_apply_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_transaction");
    group.throughput(Throughput::Elements(1));

    let l = ledger();
    let id = l.create_item(spec("APPLY")).unwrap().id_typed();
    group.bench_function("receive", |b| {
        b.iter(|| {
            l.apply_transaction(black_box(TransactionRequest::new(
                id,
                TransactionType::Receive,
                1,
            )))
            .unwrap()
        });
    });

    let a = l.create_item(spec("XFER-A")).unwrap().id_typed();
    let d = l.create_item(spec("XFER-B")).unwrap().id_typed();
    l.apply_transaction(TransactionRequest::new(a, TransactionType::Receive, i64::MAX / 2))
        .unwrap();
    group.bench_function("transfer", |b| {
        b.iter(|| {
            l.apply_transaction(black_box(TransactionRequest::new(
                a,
                TransactionType::Transfer { destination: d },
                1,
            )))
            .unwrap()
        });
    });

    group.finish();
}

fn bench_get_stock(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_stock");

    let cached = ledger();
    let id = cached.create_item(spec("READ")).unwrap().id_typed();
    group.bench_function("cache_hit", |b| {
        b.iter(|| cached.get_stock(black_box(id)).unwrap());
    });

    let uncached = StockLedger::new(
        InMemoryLedgerStore::new(),
        NoopStockCache,
        Arc::new(InMemoryEventBus::<EventEnvelope<LedgerEvent>>::new()),
    );
    let id = uncached.create_item(spec("READ")).unwrap().id_typed();
    group.bench_function("store_read", |b| {
        b.iter(|| uncached.get_stock(black_box(id)).unwrap());
    });

    group.finish();
}

fn bench_history_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_scan");

    for count in [100usize, 1_000, 10_000] {
        let l = ledger();
        let id: ItemId = l.create_item(spec("HIST")).unwrap().id_typed();
        for _ in 0..count {
            l.apply_transaction(TransactionRequest::new(id, TransactionType::Receive, 1))
                .unwrap();
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("iterate", count), &count, |b, _| {
            b.iter(|| {
                let history = l.list_transactions(id, TransactionFilter::all()).unwrap();
                history.iter().map(|t| t.unwrap().delta).sum::<i64>()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_apply_throughput,
    bench_get_stock,
    bench_history_scan
);
criterion_main!(benches);

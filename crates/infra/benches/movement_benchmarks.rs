use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group};

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use stockledger_core::{LotId, MovementKey, ProductId, ProviderId, PurchaseId, SaleId};
use stockledger_infra::{CoordinatorSettings, InMemoryCoordinator};
use stockledger_inventory::{AllocationPolicy, StockLot, allocate};
use stockledger_purchasing::Purchase;
use stockledger_sales::{PaymentMethod, Sale};

fn lots(product_id: ProductId, count: u64) -> Vec<StockLot> {
    (1..=count)
        .map(|i| StockLot {
            id: LotId::new(),
            product_id,
            quantity: 10,
            unit_cost: Decimal::from(i),
            provider_id: ProviderId::new(),
            purchase_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            // Spread expiries so ordering does real work.
            expiry_date: NaiveDate::from_ymd_opt(2025, 1, 1)
                .map(|d| d - chrono::Days::new((i * 7919) % 365)),
            sequence: i,
            source: MovementKey::new("purchase:bench").unwrap(),
        })
        .collect()
}

fn stocked_coordinator(product_lots: u64) -> (InMemoryCoordinator, ProductId) {
    let coordinator = InMemoryCoordinator::in_memory(CoordinatorSettings {
        require_known_products: false,
        ..CoordinatorSettings::default()
    });
    let product_id = ProductId::new();
    for i in 0..product_lots {
        let mut purchase = Purchase::new(PurchaseId::new(), ProviderId::new(), Utc::now());
        purchase.add_line(product_id, 1_000_000_000, Decimal::from(i + 1), None);
        coordinator.record_purchase(purchase).unwrap();
    }
    (coordinator, product_id)
}

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");

    for lot_count in [10u64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*lot_count));
        group.bench_with_input(
            BenchmarkId::new("plan_half_of_stock", lot_count),
            lot_count,
            |b, &count| {
                let product_id = ProductId::new();
                let lots = lots(product_id, count);
                let requested = (count as i64) * 5;
                let policy = AllocationPolicy::default();

                b.iter(|| {
                    black_box(allocate(product_id, black_box(requested), &lots, &policy).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_sale_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("sale_throughput");
    group.throughput(Throughput::Elements(1));

    for lot_count in [1u64, 10, 100].iter() {
        group.bench_with_input(
            BenchmarkId::new("record_sale", lot_count),
            lot_count,
            |b, &count| {
                let (coordinator, product_id) = stocked_coordinator(count);

                b.iter(|| {
                    let mut sale = Sale::new(SaleId::new(), "bench", PaymentMethod::Cash, Utc::now());
                    sale.add_line(product_id, black_box(1), dec!(9.99), Decimal::ZERO);
                    black_box(coordinator.record_sale(sale).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_purchase_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("purchase_latency");

    group.bench_function("record_purchase_single_line", |b| {
        let (coordinator, product_id) = stocked_coordinator(0);
        b.iter(|| {
            let mut purchase = Purchase::new(PurchaseId::new(), ProviderId::new(), Utc::now());
            purchase.add_line(product_id, black_box(10), dec!(1.25), None);
            black_box(coordinator.record_purchase(purchase).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_allocation,
    bench_sale_throughput,
    bench_purchase_latency
);
fn main() {
    // One log line per committed movement would swamp the timings.
    stockledger_observability::init_with_default("warn");

    benches();
    Criterion::default().configure_from_args().final_summary();
}

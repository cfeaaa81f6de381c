//! Trade enrichment example: a three-way hash join and a three-way co-group.
//!
//! ```bash
//! RUST_LOG=tributary_core=debug cargo run --example join_and_cogroup
//! ```

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tributary::prelude::*;

#[derive(Debug, Clone)]
struct Trade {
    id: u32,
    class_id: u32,
    product_id: u32,
    broker_id: u32,
}

#[derive(Debug, Clone)]
struct Product {
    id: u32,
    name: String,
}

#[derive(Debug, Clone)]
struct Broker {
    id: u32,
    name: String,
}

#[derive(Debug, Clone)]
struct ClassA {
    class_id: u32,
}

#[derive(Debug, Clone)]
struct ClassB {
    class_id: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tributary_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PipelineConfig::builder()
        .name("trade-enrichment")
        .require_drained(true)
        .build();
    let pipeline = Pipeline::with_config(config);

    let trades = pipeline.draw_from(Source::from_vec(
        "trades",
        vec![
            Trade { id: 1, class_id: 11, product_id: 1, broker_id: 10 },
            Trade { id: 2, class_id: 11, product_id: 2, broker_id: 20 },
            Trade { id: 3, class_id: 12, product_id: 7, broker_id: 10 },
        ],
    ));
    let products = pipeline.draw_from(Source::from_vec(
        "products",
        vec![
            Product { id: 1, name: "p1".into() },
            Product { id: 2, name: "p2".into() },
        ],
    ));
    let brokers = pipeline.draw_from(Source::from_vec(
        "brokers",
        vec![
            Broker { id: 10, name: "b10".into() },
            Broker { id: 20, name: "b20".into() },
        ],
    ));
    let class_a = pipeline.draw_from(Source::from_vec("a", vec![ClassA { class_id: 12 }]));
    let class_b = pipeline.draw_from(Source::from_vec(
        "b",
        vec![ClassB { class_id: 11 }, ClassB { class_id: 13 }],
    ));

    // Hash join: every trade with its product and broker
    let mut join = trades.join_builder();
    let product_tag = join.add(
        &products,
        JoinOn::on_keys(|t: &Trade| t.product_id, |p: &Product| p.id),
    );
    let broker_tag = join.add(
        &brokers,
        JoinOn::on_keys(|t: &Trade| t.broker_id, |b: &Broker| b.id),
    );
    let (enriched_sink, enriched) = Sink::collect("enriched");
    join.build()?.drain_to(enriched_sink);

    // Co-group: trades, A and B bagged per class id
    let mut co_group = trades.co_group_builder(|t: &Trade| t.class_id);
    let trade_tag = co_group.left_tag();
    let a_tag = co_group.add(&class_a, |a: &ClassA| a.class_id);
    let b_tag = co_group.add(&class_b, |b: &ClassB| b.class_id);
    let (grouped_sink, grouped) = Sink::collect("grouped");
    co_group.build_to_bags()?.drain_to(grouped_sink);

    let dag = pipeline.compile()?;
    info!(nodes = dag.node_count(), edges = dag.edge_count(), "compiled");
    let metrics = LocalExecutor::default().run(&dag)?;
    info!(?metrics, "executed");

    println!("Enriched trades:");
    for (trade, bags) in enriched.take() {
        let products: Vec<&str> = bags.bag(product_tag)?.iter().map(|p| p.name.as_str()).collect();
        let brokers: Vec<&str> = bags.bag(broker_tag)?.iter().map(|b| b.name.as_str()).collect();
        println!("  trade {} -> products {products:?}, brokers {brokers:?}", trade.id);
    }

    println!("\nGrouped by class id:");
    for (class_id, bags) in grouped.take() {
        println!(
            "  class {class_id}: {} trades, {} A, {} B",
            bags.bag(trade_tag)?.len(),
            bags.bag(a_tag)?.len(),
            bags.bag(b_tag)?.len(),
        );
    }

    Ok(())
}

//! Unit tests for pipeline construction, multi-input builders and compilation.

use crate::aggregate::{ops, AggregateOperation, AggregateOperation2};
use crate::bag::BagsByTag;
use crate::execution::LocalExecutor;
use crate::tag::Tag;

use super::*;

#[derive(Debug, Clone, PartialEq)]
struct Trade {
    id: u32,
    class_id: u32,
    product_id: u32,
    broker_id: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct Product {
    id: u32,
    name: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
struct Broker {
    id: u32,
    name: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
struct ClassA {
    class_id: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct ClassB {
    class_id: u32,
}

fn trade(id: u32, class_id: u32, product_id: u32, broker_id: u32) -> Trade {
    Trade {
        id,
        class_id,
        product_id,
        broker_id,
    }
}

/// Helper to build a two-way counting operation over the given tags.
fn count_op(left: Tag<Trade>, a: Tag<ClassA>) -> AggregateOperation<(i64, i64), (i64, i64)> {
    AggregateOperation::with_create(|| (0_i64, 0_i64))
        .and_accumulate(left, |acc: &mut (i64, i64), _: &Trade| acc.0 += 1)
        .and_accumulate(a, |acc: &mut (i64, i64), _: &ClassA| acc.1 += 1)
        .and_combine(|x: &mut (i64, i64), y: &(i64, i64)| {
            x.0 += y.0;
            x.1 += y.1;
        })
        .and_finish(|acc: &(i64, i64)| *acc)
}

// ---- Graph construction tests ----

#[test]
fn test_empty_pipeline() {
    let pipeline = Pipeline::new();
    assert_eq!(pipeline.node_count(), 0);
    assert!(matches!(pipeline.compile(), Err(PipelineError::EmptyPipeline)));
}

#[test]
fn test_linear_pipeline() {
    let pipeline = Pipeline::with_config(PipelineConfig::named("linear"));
    let (sink, _out) = Sink::collect("out");
    let src = pipeline.draw_from(Source::from_vec("numbers", vec![1_i32, 2, 3]));
    let doubled = src.map(|x: &i32| x * 2);
    let drained = doubled.drain_to(sink);

    assert_eq!(pipeline.node_count(), 3);
    assert_eq!(pipeline.upstream_of(doubled.id()).unwrap(), vec![src.id()]);
    assert_eq!(pipeline.upstream_of(drained.id()).unwrap(), vec![doubled.id()]);

    let dag = pipeline.compile().unwrap();
    assert_eq!(dag.name(), "linear");
    assert_eq!(dag.pipeline_id(), pipeline.id());
    assert_eq!(dag.edge_count(), 2);
    assert_eq!(dag.sources(), &[src.id()]);
    assert_eq!(dag.sinks(), &[drained.id()]);
    assert_eq!(dag.execution_order(), &[NodeId(0), NodeId(1), NodeId(2)]);
}

#[test]
fn test_diamond_execution_order() {
    let pipeline = Pipeline::new();
    let src = pipeline.draw_from(Source::from_vec("trades", Vec::<Trade>::new()));
    let by_class = src.map(|t: &Trade| t.class_id);
    let by_product = src.map(|t: &Trade| t.product_id);
    let joined = by_class
        .join(&by_product, JoinOn::on_keys(|c: &u32| *c, |p: &u32| *p))
        .unwrap();
    let (sink, _out) = Sink::collect("out");
    joined.drain_to(sink);

    let dag = pipeline.compile().unwrap();
    let order = dag.execution_order();
    assert_eq!(order.len(), 5);
    for node in dag.nodes() {
        let pos = order.iter().position(|&id| id == node.id()).unwrap();
        for up in node.upstream() {
            let up_pos = order.iter().position(|id| id == up).unwrap();
            assert!(up_pos < pos, "{up} must run before {}", node.id());
        }
    }
    assert_eq!(dag.downstream(src.id()), &[by_class.id(), by_product.id()]);
}

#[test]
fn test_adjacency_and_edges() {
    let pipeline = Pipeline::new();
    let src = pipeline.draw_from(Source::from_vec("numbers", vec![1_u8]));
    let a = src.map(|x: &u8| u16::from(*x));
    let b = src.filter(|x: &u8| *x > 0);

    let adjacency = pipeline.adjacency();
    assert_eq!(adjacency[&src.id()], vec![a.id(), b.id()]);
    assert!(adjacency[&a.id()].is_empty());

    let dag = pipeline.compile().unwrap();
    let edges: Vec<_> = dag.edges().collect();
    assert_eq!(edges, vec![(src.id(), a.id()), (src.id(), b.id())]);
}

#[test]
fn test_node_not_found() {
    let pipeline = Pipeline::new();
    pipeline.draw_from(Source::from_vec("numbers", vec![1_u8]));
    assert!(pipeline.node(NodeId(0)).is_ok());
    assert!(matches!(
        pipeline.node(NodeId(7)),
        Err(PipelineError::StageNotFound(NodeId(7)))
    ));
}

#[test]
fn test_node_names_and_kinds() {
    let pipeline = Pipeline::new();
    let src = pipeline.draw_from(Source::from_vec("numbers", vec![1_i32]));
    let inc = src.apply(transforms::map(|x: &i32| x + 1).named("increment"));
    let grouped = inc.group_by(|x: &i32| x % 2, ops::counting());

    let node = pipeline.node(inc.id()).unwrap();
    assert_eq!(node.name(), "increment");
    assert_eq!(node.transform().kind(), TransformKind::Map);
    assert!(node.transform().clause_tags().is_empty());

    let node = pipeline.node(grouped.id()).unwrap();
    assert_eq!(node.name(), "group-by");
    assert_eq!(pipeline.node(src.id()).unwrap().name(), "numbers");
}

// ---- Compilation checks ----

#[test]
fn test_max_fan_out_limit() {
    let config = PipelineConfig::builder().max_fan_out(2).build();
    let pipeline = Pipeline::with_config(config);
    let src = pipeline.draw_from(Source::from_vec("numbers", vec![1_i32]));
    for _ in 0..3 {
        let (sink, _out) = Sink::collect("out");
        src.drain_to(sink);
    }

    match pipeline.compile() {
        Err(PipelineError::FanOutLimitExceeded { node, count, max }) => {
            assert_eq!(node, "numbers");
            assert_eq!(count, 3);
            assert_eq!(max, 2);
        }
        other => panic!("expected fan-out error, got {other:?}"),
    }
}

#[test]
fn test_dangling_stage_warns_by_default() {
    let pipeline = Pipeline::new();
    pipeline
        .draw_from(Source::from_vec("numbers", vec![1_i32]))
        .map(|x: &i32| x + 1);
    assert!(pipeline.compile().is_ok());
}

#[test]
fn test_dangling_stage_rejected_when_drain_required() {
    let config = PipelineConfig::builder().require_drained(true).build();
    let pipeline = Pipeline::with_config(config);
    pipeline
        .draw_from(Source::from_vec("numbers", vec![1_i32]))
        .map(|x: &i32| x + 1);

    match pipeline.compile() {
        Err(PipelineError::DanglingStage(name)) => assert_eq!(name, "map"),
        other => panic!("expected dangling stage error, got {other:?}"),
    }
}

#[test]
fn test_compiled_dag_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PipelineDag>();
}

// ---- Join builder tests ----

#[test]
fn test_join_upstream_follows_tag_order() {
    let pipeline = Pipeline::new();
    let trades = pipeline.draw_from(Source::from_vec("trades", Vec::<Trade>::new()));
    let products = pipeline.draw_from(Source::from_vec("products", Vec::<Product>::new()));
    let brokers = pipeline.draw_from(Source::from_vec("brokers", Vec::<Broker>::new()));

    let mut builder = trades.join_builder();
    let product_tag = builder.add(
        &products,
        JoinOn::on_keys(|t: &Trade| t.product_id, |p: &Product| p.id),
    );
    let broker_tag = builder.add(
        &brokers,
        JoinOn::on_keys(|t: &Trade| t.broker_id, |b: &Broker| b.id),
    );
    assert_eq!(builder.left_tag().index(), 0);
    assert_eq!(product_tag.index(), 1);
    assert_eq!(broker_tag.index(), 2);
    assert_eq!(builder.clause_count(), 3);

    let joined = builder.build().unwrap();
    let node = pipeline.node(joined.id()).unwrap();
    assert_eq!(node.upstream(), &[trades.id(), products.id(), brokers.id()]);
    assert_eq!(node.transform().kind(), TransformKind::HashJoin);

    let indices: Vec<usize> = node
        .transform()
        .clause_tags()
        .iter()
        .map(|t| t.index())
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(node.transform().clause_tags()[1], product_tag.key());
}

#[test]
fn test_join_cross_graph_rejected() {
    let p1 = Pipeline::new();
    let p2 = Pipeline::new();
    let trades = p1.draw_from(Source::from_vec("trades", Vec::<Trade>::new()));
    let products = p2.draw_from(Source::from_vec("products", Vec::<Product>::new()));

    let result = trades.join(
        &products,
        JoinOn::on_keys(|t: &Trade| t.product_id, |p: &Product| p.id),
    );
    match result {
        Err(PipelineError::CrossGraphReference {
            expected, found, ..
        }) => {
            assert_eq!(expected, p1.id());
            assert_eq!(found, p2.id());
        }
        other => panic!("expected cross-graph error, got {other:?}"),
    }
    assert_eq!(p1.node_count(), 1);
    assert_eq!(p2.node_count(), 1);
}

#[test]
fn test_join_left_outer_executes() {
    let pipeline = Pipeline::new();
    let trades = pipeline.draw_from(Source::from_vec(
        "trades",
        vec![trade(1, 0, 1, 10), trade(2, 0, 2, 10), trade(3, 0, 9, 20)],
    ));
    let products = pipeline.draw_from(Source::from_vec(
        "products",
        vec![
            Product { id: 1, name: "p1" },
            Product { id: 2, name: "p2" },
        ],
    ));
    let brokers = pipeline.draw_from(Source::from_vec(
        "brokers",
        vec![Broker { id: 10, name: "b10" }],
    ));

    let mut builder = trades.join_builder();
    let product_tag = builder.add(
        &products,
        JoinOn::on_keys(|t: &Trade| t.product_id, |p: &Product| p.id),
    );
    let broker_tag = builder.add(
        &brokers,
        JoinOn::on_keys(|t: &Trade| t.broker_id, |b: &Broker| b.id),
    );
    let (sink, out) = Sink::collect("enriched");
    builder.build().unwrap().drain_to(sink);

    LocalExecutor::default()
        .run(&pipeline.compile().unwrap())
        .unwrap();

    let rows: Vec<(Trade, BagsByTag)> = out.take();
    assert_eq!(rows.len(), 3);
    let names = |bags: &BagsByTag| -> (Vec<&str>, Vec<&str>) {
        (
            bags.bag(product_tag).unwrap().iter().map(|p| p.name).collect(),
            bags.bag(broker_tag).unwrap().iter().map(|b| b.name).collect(),
        )
    };
    assert_eq!(rows[0].0.id, 1);
    assert_eq!(names(&rows[0].1), (vec!["p1"], vec!["b10"]));
    assert_eq!(names(&rows[1].1), (vec!["p2"], vec!["b10"]));
    assert_eq!(names(&rows[2].1), (vec![], vec![]));
}

#[test]
fn test_join2_positional_form() {
    let pipeline = Pipeline::new();
    let trades = pipeline.draw_from(Source::from_vec("trades", vec![trade(1, 0, 1, 10)]));
    let products = pipeline.draw_from(Source::from_vec(
        "products",
        vec![Product { id: 1, name: "p1" }],
    ));
    let brokers = pipeline.draw_from(Source::from_vec("brokers", Vec::<Broker>::new()));

    let joined = trades
        .join2(
            &products,
            JoinOn::on_keys(|t: &Trade| t.product_id, |p: &Product| p.id),
            &brokers,
            JoinOn::on_keys(|t: &Trade| t.broker_id, |b: &Broker| b.id),
        )
        .unwrap();
    let (sink, out) = Sink::collect("out");
    joined.drain_to(sink);
    LocalExecutor::default()
        .run(&pipeline.compile().unwrap())
        .unwrap();

    let rows = out.take();
    assert_eq!(rows.len(), 1);
    let (t, ps, bs) = &rows[0];
    assert_eq!(t.id, 1);
    assert_eq!(ps, &vec![Product { id: 1, name: "p1" }]);
    assert!(bs.is_empty());
}

// ---- Co-group builder tests ----

#[test]
fn test_co_group_tags_and_upstream() {
    let pipeline = Pipeline::new();
    let trades = pipeline.draw_from(Source::from_vec("trades", Vec::<Trade>::new()));
    let a = pipeline.draw_from(Source::from_vec("a", Vec::<ClassA>::new()));

    let mut builder = trades.co_group_builder(|t: &Trade| t.class_id);
    let left = builder.left_tag();
    let a_tag = builder.add(&a, |x: &ClassA| x.class_id);
    assert_eq!(left.index(), 0);
    assert_eq!(a_tag.index(), 1);
    assert_eq!(builder.tags().collect::<Vec<_>>(), vec![left.key(), a_tag.key()]);

    let grouped = builder.build(count_op(left, a_tag)).unwrap();
    let node = pipeline.node(grouped.id()).unwrap();
    assert_eq!(node.transform().kind(), TransformKind::CoGroup);
    assert_eq!(node.upstream(), &[trades.id(), a.id()]);
    assert_eq!(node.transform().clause_tags(), &[left.key(), a_tag.key()]);
}

#[test]
fn test_co_group_arity_mismatch_creates_no_node() {
    let pipeline = Pipeline::new();
    let trades = pipeline.draw_from(Source::from_vec("trades", Vec::<Trade>::new()));
    let a = pipeline.draw_from(Source::from_vec("a", Vec::<ClassA>::new()));
    let b = pipeline.draw_from(Source::from_vec("b", Vec::<ClassB>::new()));

    let mut builder = trades.co_group_builder(|t: &Trade| t.class_id);
    let left = builder.left_tag();
    let a_tag = builder.add(&a, |x: &ClassA| x.class_id);
    builder.add(&b, |x: &ClassB| x.class_id);

    match builder.build(count_op(left, a_tag)) {
        Err(PipelineError::ArityMismatch {
            expected, given, ..
        }) => {
            assert_eq!(expected, 3);
            assert_eq!(given, 2);
        }
        other => panic!("expected arity mismatch, got {other:?}"),
    }
    assert_eq!(pipeline.node_count(), 3);
}

#[test]
fn test_co_group_foreign_tags_rejected() {
    let pipeline = Pipeline::new();
    let trades = pipeline.draw_from(Source::from_vec("trades", Vec::<Trade>::new()));
    let a = pipeline.draw_from(Source::from_vec("a", Vec::<ClassA>::new()));

    let mut other = trades.co_group_builder(|t: &Trade| t.class_id);
    let other_left = other.left_tag();
    let other_a = other.add(&a, |x: &ClassA| x.class_id);

    let mut builder = trades.co_group_builder(|t: &Trade| t.class_id);
    builder.add(&a, |x: &ClassA| x.class_id);

    let result = builder.build(count_op(other_left, other_a));
    assert!(matches!(result, Err(PipelineError::ForeignTag { .. })));
    assert_eq!(pipeline.node_count(), 2);
}

#[test]
fn test_co_group_cross_graph_rejected() {
    let p1 = Pipeline::new();
    let p2 = Pipeline::new();
    let trades = p1.draw_from(Source::from_vec("trades", Vec::<Trade>::new()));
    let a = p2.draw_from(Source::from_vec("a", Vec::<ClassA>::new()));

    let mut builder = trades.co_group_builder(|t: &Trade| t.class_id);
    builder.add(&a, |x: &ClassA| x.class_id);
    let result = builder.build_to_bags();

    assert!(matches!(
        result,
        Err(PipelineError::CrossGraphReference { .. })
    ));
    assert_eq!(p1.node_count(), 1);
    assert_eq!(p2.node_count(), 1);
}

#[test]
fn test_co_group_to_bags_full_outer() {
    let pipeline = Pipeline::new();
    let trades = pipeline.draw_from(Source::from_vec(
        "trades",
        vec![trade(1, 11, 0, 0), trade(2, 11, 0, 0)],
    ));
    let a = pipeline.draw_from(Source::from_vec("a", vec![ClassA { class_id: 12 }]));
    let b = pipeline.draw_from(Source::from_vec(
        "b",
        vec![ClassB { class_id: 11 }, ClassB { class_id: 11 }],
    ));

    let mut builder = trades.co_group_builder(|t: &Trade| t.class_id);
    let trade_tag = builder.left_tag();
    let a_tag = builder.add(&a, |x: &ClassA| x.class_id);
    let b_tag = builder.add(&b, |x: &ClassB| x.class_id);
    let (sink, out) = Sink::collect("grouped");
    builder.build_to_bags().unwrap().drain_to(sink);

    LocalExecutor::default()
        .run(&pipeline.compile().unwrap())
        .unwrap();

    let rows = out.take();
    let keys: Vec<u32> = rows.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![11, 12]);

    let (_, bags) = &rows[0];
    assert_eq!(bags.bag(trade_tag).unwrap().len(), 2);
    assert!(bags.bag(a_tag).unwrap().is_empty());
    assert_eq!(bags.bag(b_tag).unwrap().len(), 2);

    let (_, bags) = &rows[1];
    assert!(bags.bag(trade_tag).unwrap().is_empty());
    assert_eq!(bags.bag(a_tag).unwrap(), &[ClassA { class_id: 12 }]);
}

#[test]
fn test_co_group_positional_form() {
    let pipeline = Pipeline::new();
    let trades = pipeline.draw_from(Source::from_vec(
        "trades",
        vec![trade(1, 1, 0, 0), trade(2, 2, 0, 0)],
    ));
    let a = pipeline.draw_from(Source::from_vec(
        "a",
        vec![ClassA { class_id: 2 }, ClassA { class_id: 3 }],
    ));

    let op: AggregateOperation2<Trade, ClassA, (i64, i64), (i64, i64)> =
        AggregateOperation::with_create(|| (0_i64, 0_i64))
            .and_accumulate0(|acc: &mut (i64, i64), _: &Trade| acc.0 += 1)
            .and_accumulate1(|acc: &mut (i64, i64), _: &ClassA| acc.1 += 1)
            .and_combine(|x: &mut (i64, i64), y: &(i64, i64)| {
                x.0 += y.0;
                x.1 += y.1;
            })
            .and_finish(|acc: &(i64, i64)| *acc);
    let grouped = trades
        .co_group(|t: &Trade| t.class_id, &a, |x: &ClassA| x.class_id, op)
        .unwrap();
    let (sink, out) = Sink::collect("counts");
    grouped.drain_to(sink);

    LocalExecutor::default()
        .run(&pipeline.compile().unwrap())
        .unwrap();
    assert_eq!(out.take(), vec![(1, (1, 0)), (2, (1, 1)), (3, (0, 1))]);
}

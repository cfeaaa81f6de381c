//! Aggregate operation and tagged bag behavior through the public API.

use tributary::prelude::*;

fn sum_and_len() -> AggregateOperation<(i64, usize), (i64, usize)> {
    AggregateOperation::with_create(|| (0_i64, 0_usize))
        .and_accumulate(Tag::<i64>::positional(0), |acc: &mut (i64, usize), x: &i64| {
            acc.0 += x;
        })
        .and_accumulate(Tag::<String>::positional(1), |acc: &mut (i64, usize), s: &String| {
            acc.1 += s.len();
        })
        .and_combine(|a: &mut (i64, usize), b: &(i64, usize)| {
            a.0 += b.0;
            a.1 += b.1;
        })
        .and_deduct(|a: &mut (i64, usize), b: &(i64, usize)| {
            a.0 -= b.0;
            a.1 -= b.1;
        })
        .and_finish(|acc: &(i64, usize)| *acc)
}

#[test]
fn test_with_finish_is_non_destructive() {
    let op = ops::summing_i64(|x: &i64| *x);
    let negated = op.with_finish(|acc: &i64| -acc);

    let mut acc = op.create_accumulator();
    op.accumulate(&mut acc, &4);
    negated.accumulate(&mut acc, &3);

    assert_eq!(op.finish(&acc), 7);
    assert_eq!(negated.finish(&acc), -7);
    assert!(op.has_deduct());
    assert!(negated.has_deduct());

    let mut other = negated.create_accumulator();
    negated.accumulate(&mut other, &3);
    op.deduct(&mut acc, &other).unwrap();
    assert_eq!(op.finish(&acc), 4);
}

#[test]
fn test_forward_only_operation_rejects_deduct() {
    let op = ops::to_list::<u8>();
    let mut acc = op.create_accumulator();
    let other = op.create_accumulator();
    assert!(!op.has_deduct());
    assert!(matches!(
        op.deduct(&mut acc, &other),
        Err(PipelineError::DeductUnsupported)
    ));
}

#[test]
fn test_accumulators_by_tag_validation() {
    let op = sum_and_len();
    assert_eq!(op.arity(), 2);

    let exact = AccumulatorsByTag::new()
        .with(Tag::<i64>::positional(0), |acc: &mut (i64, usize), x: &i64| {
            acc.0 += 2 * x;
        })
        .with(Tag::<String>::positional(1), |acc: &mut (i64, usize), _: &String| {
            acc.1 += 1;
        });
    let swapped = op.with_accumulators_by_tag(exact.clone()).unwrap();
    assert_eq!(swapped.accumulators_by_tag(), &exact);

    let mut acc = swapped.create_accumulator();
    swapped.accumulate(Tag::<i64>::positional(0), &mut acc, &5).unwrap();
    swapped
        .accumulate(Tag::<String>::positional(1), &mut acc, &"abc".to_string())
        .unwrap();
    assert_eq!(swapped.finish(&acc), (10, 1));

    // The receiver keeps its own accumulate functions.
    let mut acc = op.create_accumulator();
    op.accumulate(Tag::<i64>::positional(0), &mut acc, &5).unwrap();
    assert_eq!(op.finish(&acc), (5, 0));

    let missing = AccumulatorsByTag::new()
        .with(Tag::<i64>::positional(0), |_: &mut (i64, usize), _: &i64| {});
    assert!(matches!(
        op.with_accumulators_by_tag(missing),
        Err(PipelineError::ArityMismatch { expected: 2, given: 1, .. })
    ));

    let extra = exact
        .clone()
        .with(Tag::<u8>::positional(2), |_: &mut (i64, usize), _: &u8| {});
    assert!(matches!(
        op.with_accumulators_by_tag(extra),
        Err(PipelineError::ArityMismatch { expected: 2, given: 3, .. })
    ));

    let wrong_slot = AccumulatorsByTag::new()
        .with(Tag::<i64>::positional(0), |_: &mut (i64, usize), _: &i64| {})
        .with(Tag::<String>::positional(2), |_: &mut (i64, usize), _: &String| {});
    assert!(matches!(
        op.with_accumulators_by_tag(wrong_slot),
        Err(PipelineError::MissingTag { .. })
    ));
}

#[test]
fn test_fixed_arity_round_trip() {
    let op: AggregateOperation2<u32, String, usize, usize> =
        AggregateOperation::with_create(|| 0_usize)
            .and_accumulate0(|acc: &mut usize, _: &u32| *acc += 1)
            .and_accumulate1(|acc: &mut usize, s: &String| *acc += s.len())
            .and_combine(|a: &mut usize, b: &usize| *a += b)
            .and_finish(|acc: &usize| *acc);

    let registry = op.accumulators_by_tag();
    assert_eq!(registry.len(), 2);
    let rebuilt = op.with_accumulators_by_tag(&registry).unwrap();

    let mut acc = rebuilt.create_accumulator();
    (rebuilt.accumulate_item_f0())(&mut acc, &9);
    (rebuilt.accumulate_item_f1())(&mut acc, &"four".to_string());
    assert_eq!(rebuilt.finish(&acc), 5);

    let tagged = op.to_tagged();
    assert_eq!(
        tagged.tags().collect::<Vec<_>>(),
        vec![Tag::<u32>::tag0().key(), Tag::<String>::tag1().key()]
    );
}

#[test]
fn test_bag_combine_is_order_independent() {
    let pipeline = Pipeline::new();
    let primary = pipeline.draw_from(Source::from_vec("numbers", Vec::<u32>::new()));
    let words = pipeline.draw_from(Source::from_vec("words", Vec::<String>::new()));
    let mut builder = primary.co_group_builder(|x: &u32| *x);
    let n = builder.left_tag();
    let w = builder.add(&words, |s: &String| u32::try_from(s.len()).unwrap_or(u32::MAX));

    let mut a = BagsByTag::new();
    a.put(n, vec![1, 2]);
    let mut b = BagsByTag::new();
    b.put(w, vec!["x".to_string()]);
    let mut c = BagsByTag::new();
    c.put(n, vec![3]);
    c.put(w, vec!["y".to_string()]);

    let mut left = a.clone();
    left.combine_with(&b);
    left.combine_with(&c);

    let mut bc = b.clone();
    bc.combine_with(&c);
    let mut right = a.clone();
    right.combine_with(&bc);

    let sorted = |bags: &BagsByTag| {
        let mut nums = bags.bag(n).unwrap().to_vec();
        let mut strs = bags.bag(w).unwrap().to_vec();
        nums.sort_unstable();
        strs.sort();
        (nums, strs)
    };
    assert_eq!(sorted(&left), sorted(&right));
    assert_eq!(sorted(&left), (vec![1, 2, 3], vec!["x".to_string(), "y".to_string()]));

    assert!(matches!(
        BagsByTag::new().bag(n),
        Err(BagError::NoBagForTag(_))
    ));
}

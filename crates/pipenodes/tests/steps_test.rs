use pipecore::{
    Indices, Inputs, Params, Pipeline, PipelineError, Step, StepError, Tensor, Tuple, Value,
    ViewId, BOUNDED_EPOCH,
};
use pipenodes::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn nums(values: &[f64]) -> Tuple {
    values.iter().map(|&v| Value::from(v)).collect()
}

fn take(pipeline: &mut Pipeline, view: ViewId, n: usize) -> Vec<Tuple> {
    (0..n).map(|_| pipeline.request(view, None).unwrap()).collect()
}

#[test]
fn test_counter_is_shared_between_views() {
    let counter = Arc::new(Counter::new(2));
    let mut pipeline = Pipeline::new();
    let a = pipeline.source(counter.clone()).unwrap();
    let b = pipeline.source(counter).unwrap();

    assert_eq!(pipeline.request(a, None).unwrap(), nums(&[1.0, 1.0]));
    assert_eq!(pipeline.request(b, None).unwrap(), nums(&[2.0, 2.0]));
    assert_eq!(pipeline.request(a, None).unwrap(), nums(&[3.0, 3.0]));
}

#[test]
fn test_sequence_loops_or_ends_the_pass() {
    let items = vec![nums(&[1.0]), nums(&[2.0])];
    let mut pipeline = Pipeline::new();
    let looping = pipeline
        .source(Arc::new(Sequence::new(items.clone()).unwrap()))
        .unwrap();
    assert_eq!(
        take(&mut pipeline, looping, 3),
        vec![nums(&[1.0]), nums(&[2.0]), nums(&[1.0])]
    );

    let bounded = pipeline
        .connect_with(
            Arc::new(Sequence::new(items.clone()).unwrap()),
            Inputs::None,
            Indices::All,
            &Params::new().with(BOUNDED_EPOCH, true),
        )
        .unwrap();
    let pass: Vec<Tuple> = pipeline
        .stream(bounded, None)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(pass, items);

    assert!(Sequence::new(Vec::new()).is_err());
}

#[test]
fn test_duplicator_yields_separate_units() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(1))).unwrap();
    let dup = pipeline
        .connect(Arc::new(Duplicator::new(3)), source, Indices::All)
        .unwrap();

    let seen: Vec<f64> = take(&mut pipeline, dup, 7)
        .iter()
        .map(|t| t[0].as_f64().unwrap())
        .collect();
    assert_eq!(seen, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0]);
}

#[test]
fn test_duplicate_stream_widens_tuples() {
    let mut pipeline = Pipeline::new();
    let source = pipeline
        .source(Arc::new(Sequence::new(vec![nums(&[1.0, 2.0])]).unwrap()))
        .unwrap();
    let wide = pipeline
        .connect(Arc::new(DuplicateStream::new(2)), source, Indices::All)
        .unwrap();

    assert_eq!(
        pipeline.request(wide, None).unwrap(),
        nums(&[1.0, 2.0, 1.0, 2.0])
    );
    assert_eq!(pipeline.request(wide, Some(&[3])).unwrap(), nums(&[2.0]));
}

#[test]
fn test_round_robin_merger_gathers_consecutive_inputs() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(1))).unwrap();
    let merged = pipeline
        .connect(Arc::new(RoundRobinMerger::new(3)), source, Indices::All)
        .unwrap();

    assert_eq!(pipeline.request(merged, None).unwrap(), nums(&[1.0, 2.0, 3.0]));
    assert_eq!(pipeline.request(merged, None).unwrap(), nums(&[4.0, 5.0, 6.0]));
}

#[test]
fn test_block_connects_a_chain() {
    let add_one = FunctionTransformer::new("test.add_one", |value, _| {
        Ok(Value::from(value.as_f64().unwrap_or_default() + 1.0))
    });
    let steps: Vec<Arc<dyn Step>> = vec![Arc::new(add_one), Arc::new(Identity), Arc::new(Identity)];
    let block = Block::new(steps);

    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(3))).unwrap();
    let before = pipeline.view_count();
    let out = block.connect(&mut pipeline, source, vec![0, 2]).unwrap();

    assert_eq!(pipeline.view_count(), before + 3);
    assert_eq!(pipeline.request(out, None).unwrap(), nums(&[2.0, 2.0]));

    let err = Block::new(Vec::new())
        .connect(&mut pipeline, source, Indices::All)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Step(_)));
}

#[test]
fn test_function_transformer_reads_view_params() {
    let scale = Arc::new(
        FunctionTransformer::new("test.scale", |value, params| {
            let factor = params.f64_or("factor", 1.0)?;
            Ok(Value::from(value.as_f64().unwrap_or_default() * factor))
        })
        .with_defaults(Params::new().with("factor", 2.0)),
    );

    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(1))).unwrap();
    let doubled = pipeline.connect(scale, source, Indices::All).unwrap();
    let tenfold = pipeline
        .get_view(doubled, &Params::new().with("factor", 10.0))
        .unwrap();

    assert_eq!(pipeline.request(doubled, None).unwrap(), nums(&[2.0]));
    assert_eq!(pipeline.request(tenfold, None).unwrap(), nums(&[20.0]));
}

#[test]
fn test_list_round_trip() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(3))).unwrap();
    let list = pipeline
        .connect(Arc::new(StreamsToList), source, Indices::All)
        .unwrap();
    let streams = pipeline
        .connect(Arc::new(ListToStreams), list, Indices::All)
        .unwrap();

    assert_eq!(pipeline.request(list, None).unwrap(), vec![Value::Array(nums(&[1.0; 3]))]);
    assert_eq!(pipeline.request(streams, None).unwrap(), nums(&[2.0; 3]));
}

#[test]
fn test_list_to_streams_rejects_scalars() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(1))).unwrap();
    let streams = pipeline
        .connect(Arc::new(ListToStreams), source, Indices::All)
        .unwrap();

    let err = pipeline.request(streams, None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Step(StepError::InvalidInput { .. })
    ));
}

#[test]
fn test_streams_to_tuple_ends_the_pipeline() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(2))).unwrap();
    let sink = pipeline
        .connect(Arc::new(StreamsToTuple), source, Indices::All)
        .unwrap();

    assert_eq!(pipeline.request(sink, None).unwrap(), nums(&[1.0, 1.0]));
    assert!(pipeline
        .connect(Arc::new(Identity), sink, Indices::All)
        .is_err());
}

#[test]
fn test_stack_streams_adds_a_last_axis() {
    let items = vec![vec![
        Value::Tensor(Tensor::vector(vec![1.0, 2.0, 3.0])),
        Value::Array(nums(&[10.0, 20.0, 30.0])),
    ]];
    let mut pipeline = Pipeline::new();
    let source = pipeline
        .source(Arc::new(Sequence::new(items).unwrap()))
        .unwrap();
    let stacked = pipeline
        .connect(Arc::new(StackStreams), source, Indices::All)
        .unwrap();

    let out = pipeline.request(stacked, None).unwrap();
    let tensor = out[0].as_tensor().unwrap();
    assert_eq!(tensor.shape, vec![3, 2]);
    assert_eq!(tensor.data, vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);
}

#[test]
fn test_batcher_stacks_along_the_first_axis() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(2))).unwrap();
    let vectors = pipeline
        .connect(Arc::new(ToTensor), source, 1)
        .unwrap();
    let batcher = pipeline
        .connect_with(
            Arc::new(Batcher),
            [source, vectors],
            vec![Some(vec![0]), None],
            &Params::new().with("batch_size", 3usize),
        )
        .unwrap();

    let out = pipeline.request(batcher, None).unwrap();
    let scalars = out[0].as_tensor().unwrap();
    assert_eq!(scalars.shape, vec![3]);
    assert_eq!(scalars.data, vec![1.0, 2.0, 3.0]);
    let rows = out[1].as_tensor().unwrap();
    assert_eq!(rows.shape, vec![3, 1]);
    assert_eq!(rows.data, vec![1.0, 2.0, 3.0]);

    let err = pipeline
        .request_with(batcher, None, &Params::new().with("batch_size", 0usize))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Step(StepError::InvalidParam { .. })
    ));
}

#[test]
fn test_dict_to_value_picks_the_key() {
    let mut record = HashMap::new();
    record.insert("label".to_string(), Value::from("cat"));
    record.insert("score".to_string(), Value::from(0.9));
    let items = vec![vec![Value::Object(record)]];

    let mut pipeline = Pipeline::new();
    let source = pipeline
        .source(Arc::new(Sequence::new(items).unwrap()))
        .unwrap();
    let label = pipeline
        .connect_with(
            Arc::new(DictToValue),
            source,
            Indices::All,
            &Params::new().with("key", "label"),
        )
        .unwrap();
    let unkeyed = pipeline
        .connect(Arc::new(DictToValue), source, Indices::All)
        .unwrap();

    assert_eq!(pipeline.request(label, None).unwrap(), vec![Value::from("cat")]);
    let missing = pipeline
        .request_with(label, None, &Params::new().with("key", "weight"))
        .unwrap_err();
    assert!(matches!(
        missing,
        PipelineError::Step(StepError::InvalidInput { .. })
    ));
    let err = pipeline.request(unkeyed, None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Step(StepError::MissingParam(_))
    ));
}

#[test]
fn test_to_tensor_converts_numbers_and_arrays() {
    let items = vec![vec![
        Value::from(4.0),
        Value::Array(vec![
            Value::Array(nums(&[1.0, 2.0])),
            Value::Array(nums(&[3.0, 4.0])),
        ]),
        Value::from("text"),
    ]];
    let mut pipeline = Pipeline::new();
    let source = pipeline
        .source(Arc::new(Sequence::new(items).unwrap()))
        .unwrap();
    let tensors = pipeline
        .connect(Arc::new(ToTensor), source, vec![0, 1])
        .unwrap();
    let text = pipeline
        .connect(Arc::new(ToTensor), source, 2)
        .unwrap();

    let out = pipeline.request(tensors, None).unwrap();
    assert_eq!(out[0], Value::Tensor(Tensor::vector(vec![4.0])));
    assert_eq!(
        out[1],
        Value::Tensor(Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap())
    );
    assert!(pipeline.request(text, None).is_err());
}

#[test]
fn test_debug_step_hands_tuples_to_callback() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let debug = DebugStep::with_callback(move |tuple| sink.lock().unwrap().push(tuple.clone()));

    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(1))).unwrap();
    let view = pipeline
        .connect(Arc::new(debug), source, Indices::All)
        .unwrap();

    take(&mut pipeline, view, 2);
    assert_eq!(*seen.lock().unwrap(), vec![nums(&[1.0]), nums(&[2.0])]);
}

#[test]
fn test_preview_happens_once_per_step() {
    let preview = Arc::new(PreviewIdentity::new("counter", PreviewKind::Minimal));
    let mut pipeline = Pipeline::new();
    let source = pipeline.source(Arc::new(Counter::new(1))).unwrap();
    let view = pipeline.connect(preview.clone(), source, Indices::All).unwrap();
    let copy = pipeline.get_view(view, &Params::new()).unwrap();

    assert!(!preview.has_previewed());
    assert_eq!(pipeline.request(view, None).unwrap(), nums(&[1.0]));
    assert!(preview.has_previewed());
    assert_eq!(pipeline.request(copy, None).unwrap(), nums(&[2.0]));

    let tuple = vec![
        Value::Tensor(Tensor::new(vec![2, 3], vec![0.0; 6]).unwrap()),
        Value::from("cat"),
        Value::Array(vec![Value::from(1.5)]),
    ];
    assert_eq!(minimal_preview(&tuple), "[[2, 3], cat, [1.5]]");
}

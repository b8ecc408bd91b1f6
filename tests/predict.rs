mod common;

use approx::assert_abs_diff_eq;
use ndarray::{s, Array1};
use tempfile::tempdir;

use common::{config, observations};
use gnnwr_datasets::{
    dataset::Columns, init_dataset, init_predict_dataset, DatasetErr, PartitionedDataset,
    PredictConfig,
};

#[test]
fn prediction_rows_match_the_trained_layout() {
    let p = init_dataset(&observations(100), &config()).unwrap();
    let fresh = observations(15);

    let pred = init_predict_dataset(&fresh, &p.train, &PredictConfig::default()).unwrap();
    assert_eq!(pred.len(), 15);
    assert_eq!(pred.feature_dim(), p.train.feature_dim());
    assert_eq!(pred.distances().dim(), (15, 70, 1));
    assert_eq!(pred.x_data().column(2), Array1::<f32>::ones(15));
    assert_eq!(pred.x_scale(), p.train.x_scale().unwrap());

    let sample = pred.sample(4).unwrap();
    assert_eq!(sample.distances.dim(), (70, 1));
    assert!(matches!(
        pred.sample(15),
        Err(DatasetErr::IndexOutOfRange { index: 15, len: 15 })
    ));
}

#[test]
fn training_rows_reproduce_the_training_tensors() {
    let p = init_dataset(&observations(100), &config()).unwrap();
    let pred = init_predict_dataset(p.train.frame(), &p.train, &PredictConfig::default()).unwrap();

    assert_eq!(pred.distances(), p.train.distances());
    assert_eq!(pred.x_data(), p.train.x_data());
}

#[test]
fn stnn_prediction_joins_time() {
    let cfg = config().with_temporal(vec!["t".into()]).with_stnn(true);
    let p = init_dataset(&observations(60), &cfg).unwrap();
    let pred = init_predict_dataset(&observations(5), &p.train, &PredictConfig::default()).unwrap();

    assert_eq!(pred.distances().dim(), (5, 42, 4));
    assert_eq!(pred.temporal().unwrap().dim(), (5, 42, 2));
    assert_eq!(pred.sample(0).unwrap().distances.dim(), (42, 6));
}

#[test]
fn batches_cover_rows_in_order() {
    let p = init_dataset(&observations(100), &config()).unwrap();
    let cfg = PredictConfig {
        max_size: Some(4),
        ..PredictConfig::default()
    };
    let pred = init_predict_dataset(&observations(10), &p.train, &cfg).unwrap();

    let batches: Vec<_> = pred.batches().collect::<Result<_, _>>().unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].rows, 0..4);
    assert_eq!(batches[2].rows, 8..10);
    assert_eq!(batches[2].x, pred.x_data().slice(s![8..10, ..]));
    assert_eq!(batches[1].distances.dim(), (4, 70, 1));
}

#[test]
fn unsynchronised_scaling_fits_the_new_rows() {
    let p = init_dataset(&observations(100), &config()).unwrap();
    let cfg = PredictConfig {
        scale_sync: false,
        ..PredictConfig::default()
    };
    let pred = init_predict_dataset(&observations(12), &p.train, &cfg).unwrap();

    let x1 = pred.x_data().column(0);
    assert_abs_diff_eq!(x1[0], 0.);
    assert_abs_diff_eq!(x1[11], 1.);
    assert_ne!(pred.x_scale(), p.train.x_scale().unwrap());
}

#[test]
fn rescale_uses_the_trained_labels() {
    let p = init_dataset(&observations(100), &config()).unwrap();
    let pred = init_predict_dataset(&observations(3), &p.train, &PredictConfig::default()).unwrap();

    let y_scale = p.train.y_scale().unwrap();
    let raw = p.test.y_data().slice(s![..3, ..]).to_owned();
    let scaled = y_scale.apply(raw.view()).unwrap();
    assert_abs_diff_eq!(pred.rescale(scaled.view()).unwrap(), raw, epsilon = 1e-3);
}

#[test]
fn loaded_training_bundle_backs_predictions() {
    let p = init_dataset(&observations(100), &config()).unwrap();
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("train");
    p.train.persist(&dir).unwrap();

    let loaded = PartitionedDataset::load(&dir).unwrap();
    let fresh = observations(8);
    let a = init_predict_dataset(&fresh, &loaded, &PredictConfig::default()).unwrap();
    let b = init_predict_dataset(&fresh, &p.train, &PredictConfig::default()).unwrap();

    assert_eq!(a.distances(), b.distances());
    assert_eq!(a.x_data(), b.x_data());
}

#[test]
fn unscaled_or_unmeasured_datasets_are_refused() {
    let columns = Columns {
        x: vec!["x1".into()],
        y: vec!["y".into()],
        id: "t".into(),
        spatial: vec!["lon".into(), "lat".into()],
        temporal: None,
    };
    let raw = PartitionedDataset::new(observations(10), columns, false, true).unwrap();

    assert!(matches!(
        init_predict_dataset(&observations(3), &raw, &PredictConfig::default()),
        Err(DatasetErr::InvalidState(_))
    ));

    let p = init_dataset(&observations(30), &config()).unwrap();
    let cfg = PredictConfig {
        spatial_fn: None,
        ..PredictConfig::default()
    };
    assert!(matches!(
        init_predict_dataset(&observations(3), &p.train, &cfg),
        Err(DatasetErr::InvalidArgument(_))
    ));
}

// Scoring module
// Standardization, null model and random forest evaluation, live scoring of single readings

pub mod evaluate;
pub mod forest;
pub mod live;
pub mod model;
pub mod standardize;

pub use evaluate::{
    evaluate_models, rmse_per_target, train_test_split, EvaluationReport, ModelFileError,
    ScoringModel, Split,
};
pub use forest::{ForestParams, RandomForestRegressor, RegressionTree};
pub use live::{LiveScorer, ScoreCard};
pub use model::{MeanRegressor, Regressor, ScoringError};
pub use standardize::Standardizer;

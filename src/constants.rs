// Model parameters
pub const SEQUENCE_LENGTH: usize = 48; // Number of time steps to look back
pub const PREDICTION_LENGTH: usize = 24; // Number of time steps to forecast
pub const SEGMENT_LENGTH: usize = 12; // Time steps per segment
pub const D_MODEL: usize = 128; // Segment embedding / GRU hidden width
pub const DEFAULT_DROPOUT: f64 = 0.1;

// Training parameters
pub const LEARNING_RATE: f64 = 1e-4;
pub const WEIGHT_DECAY: f32 = 1.5e-3;
pub const BATCH_SIZE: usize = 64;
pub const EPOCHS: usize = 10;
pub const EARLY_STOP_LOSS: f64 = 7.0; // Stop once the test loss drops below this
pub const LOG_EVERY_EPOCHS: usize = 10;
pub const ACCURACY_TOLERANCE: f64 = 0.5; // Absolute error counted as a hit
pub const NUM_WORKERS: usize = 1; // Data loader threads

// ReduceLROnPlateau
pub const PLATEAU_PATIENCE: usize = 10;
pub const PLATEAU_FACTOR: f64 = 0.5;
pub const PLATEAU_THRESHOLD: f64 = 1e-4;
pub const PLATEAU_COOLDOWN: usize = 0;
pub const PLATEAU_MIN_LR: f64 = 0.0;
pub const PLATEAU_EPS: f64 = 1e-8;

// Data preprocessing
pub const VALIDATION_SPLIT_RATIO: f64 = 0.2; // 20% of each series for testing
pub const TRAIN_DATA_DIR: &str = "./data/train";
pub const TEST_DATA_DIR: &str = "./data/test";

// Model paths
pub const CHECKPOINT_PATH: &str = "models/model";
pub const CHECKPOINT_META_EXTENSION: &str = "meta.json";
pub const RUN_CONFIG_FILE: &str = "segrnn_config.json";

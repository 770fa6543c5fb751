//! Process-wide constants that are not runtime-tunable

/// Capacity of the demuxer -> worker frame queues.
pub const FRAME_QUEUE_CAPACITY: usize = 2048;

/// Chunks fetched per transcriber poll.
pub const TRANSCRIBER_BATCH_SIZE: i32 = 10;

/// Bytes per audio event sent to the speech-to-text service.
pub const STT_AUDIO_EVENT_BYTES: usize = 16 * 1024;

/// Recompute topic boundaries after this many new transcript words.
pub const TOPIC_REFRESH_WORDS: usize = 100;

/// Allowed micro-adjust delta range for the start edge, seconds.
pub const START_DELTA_RANGE: (f64, f64) = (-1.0, 1.0);

/// Allowed micro-adjust delta range for the end edge, seconds.
pub const END_DELTA_RANGE: (f64, f64) = (-1.5, 1.5);

/// Mid frames shown to the edge refiner.
pub const REFINER_MAX_MID_FRAMES: usize = 3;

/// Idle sleeps, milliseconds.
pub const QUEUE_POLL_MS: u64 = 200;
pub const SCORER_RETRY_MS: u64 = 500;
pub const ASSEMBLER_WAIT_MS: u64 = 5000;
pub const TRANSCRIBER_IDLE_MS: u64 = 2000;

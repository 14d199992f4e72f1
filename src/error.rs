#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to construct NotNan from f32: {1}")]
    ConstructNotNan(#[source] ordered_float::FloatIsNan, f32),

    #[error("joint confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f32),

    #[error("failed to convert usize value to joint kind: {0}")]
    ConvertUSizeToJointKind(usize),

    #[error("failed to read pose stream line {0}")]
    ReadLine(usize, #[source] std::io::Error),

    #[error("failed to decode pose snapshot on line {0}")]
    DecodeSnapshot(usize, #[source] serde_json::Error),

    #[error("invalid pose snapshot on line {0}")]
    InvalidSnapshot(usize, #[source] Box<Error>),
}

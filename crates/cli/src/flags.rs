use clap::ValueEnum;

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum EmbedMode {
    Fast,
    Stub,
    Off,
}

impl EmbedMode {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            EmbedMode::Fast => "fast",
            EmbedMode::Stub => "stub",
            EmbedMode::Off => "off",
        }
    }
}

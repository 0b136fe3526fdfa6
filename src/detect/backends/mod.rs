mod stub;

pub use stub::StubAnalyzer;

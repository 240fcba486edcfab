// This module is only compiled during tests

pub mod mock_bus;
pub mod mock_pwm;
pub mod mock_stream;

pub use mock_bus::MockBus;
pub use mock_pwm::MockPulseOutput;
pub use mock_stream::MockStream;

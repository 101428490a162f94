pub mod fake_encoder;

pub mod face_encoder;

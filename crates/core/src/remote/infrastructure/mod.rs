pub mod firebase_control_plane;

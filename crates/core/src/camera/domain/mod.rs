pub mod camera_handle;

//! Frame lifecycle tests driven through the headless backend

mod frame_lifecycle;

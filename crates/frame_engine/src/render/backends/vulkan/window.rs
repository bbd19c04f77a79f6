//! GLFW window that owns the presentation surface

use ash::vk;
use thiserror::Error;

use crate::render::api::{Extent2D, WindowSurface};

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Resizable GLFW window without a client API, ready for a Vulkan surface
///
/// Polling drains the GLFW event queue into a buffer the application reads with
/// [`GlfwWindow::take_events`]; framebuffer resize events also raise the resize flag the
/// renderer checks after presenting.
pub struct GlfwWindow {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    pending_events: Vec<glfw::WindowEvent>,
    framebuffer_resized: bool,
}

impl GlfwWindow {
    /// Open a window of `width` by `height` screen coordinates
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_cursor_pos_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            pending_events: Vec::new(),
            framebuffer_resized: false,
        })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request (or cancel) closing the window
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Process pending window events without blocking
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.collect_events();
    }

    /// Events gathered since the last call
    pub fn take_events(&mut self) -> Vec<glfw::WindowEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Current state of a key
    pub fn key(&self, key: glfw::Key) -> glfw::Action {
        self.window.get_key(key)
    }

    /// Cursor position in screen coordinates
    pub fn cursor_pos(&self) -> (f64, f64) {
        self.window.get_cursor_pos()
    }

    /// Instance extensions GLFW needs to create a surface
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Vulkan is not supported by GLFW".to_string()))
    }

    /// Create the presentation surface for `instance`
    pub fn create_surface(&self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("failed to create window surface: {result:?}")))
        }
    }

    fn collect_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(width, height) = event {
                log::debug!("Framebuffer resized to {width}x{height}");
                self.framebuffer_resized = true;
            }
            self.pending_events.push(event);
        }
    }
}

impl WindowSurface for GlfwWindow {
    fn framebuffer_extent(&self) -> Extent2D {
        let (width, height) = self.window.get_framebuffer_size();
        Extent2D::new(width.max(0) as u32, height.max(0) as u32)
    }

    fn was_resized(&self) -> bool {
        self.framebuffer_resized
    }

    fn reset_resized_flag(&mut self) {
        self.framebuffer_resized = false;
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.collect_events();
    }
}

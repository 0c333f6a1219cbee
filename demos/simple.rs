use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use vk_resolver::ash::vk;
use vk_resolver::{Context, ContextBuilder, Tier};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

#[derive(Default, Debug)]
struct App {
    // Dropped before the window it presents to.
    context: Option<Context>,
    window: Option<Arc<Window>>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let init = || -> anyhow::Result<(Arc<Window>, Context)> {
            let window = Arc::new(event_loop.create_window(WindowAttributes::default())?);

            let context = ContextBuilder::new()
                .app_name("Example Vulkan Application")
                .engine_name("Example Vulkan Engine")
                .request_validation_layers(true)
                .debug_messenger(true)
                .present_mode(vk::PresentModeKHR::MAILBOX)
                .window(&*window)
                .build()?;

            if let Some(device) = context.device() {
                let (family, _graphics_queue) = device.first_queue_with(vk::QueueFlags::GRAPHICS)?;
                tracing::info!(
                    device = device.physical_device().name(),
                    family,
                    present_mode = ?context.present_mode(),
                    swapchain_functions = device.table().entries_of(Tier::DeviceExtension).count(),
                    "Vulkan is ready"
                );
            }

            Ok((window, context))
        };

        match init() {
            Ok((window, context)) => {
                self.context.replace(context);
                self.window.replace(window);
            }
            Err(err) => {
                tracing::error!(%err, "Could not initialize Vulkan");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::CloseRequested = event {
            // Tear down while the window still exists.
            if let Some(mut context) = self.context.take() {
                context.release();
            }
            event_loop.exit();
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let event_loop = EventLoop::new()?;
    let mut app = App::default();
    event_loop.run_app(&mut app)?;

    Ok(())
}

#![warn(missing_docs)]
//! # leonel-quick-app binary
//!
//! Desktop entry point for leonel-quick.

/// CLI entry point.
fn main() {
    let config = match leonel_quick_app::ShellConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid leonel-quick configuration: {error}");
            std::process::exit(1);
        }
    };

    #[cfg(any(windows, target_os = "macos"))]
    {
        if let Err(error) = native_shell::start(config) {
            eprintln!("failed to start leonel-quick: {error}");
            std::process::exit(1);
        }
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        println!("leonel-quick-app {}", leonel_quick_app::app_version());
        println!("{config}");
    }
}

#[cfg(any(windows, target_os = "macos"))]
mod native_shell {
    //! Tray-resident shell: tao event loop, wry overlay, tray icon and global
    //! shortcut, all feeding one [`Dispatcher`].

    use std::str::FromStr;
    use std::sync::Arc;

    use global_hotkey::hotkey::{Code, HotKey, Modifiers};
    use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
    use leonel_quick_app::{
        AppError, Dispatcher, Flow, InstanceRole, LaunchEvent, ShellConfig, Shortcut,
        ToggleSource, acquire, contain, executable_dir, init_logging, install_panic_hook,
        redact_args, register_protocol_handler, system_work_area, tray_tooltip,
    };
    use leonel_quick_capture::{CaptureWorker, RealSourceProvider, ScreenshotCapturer};
    use leonel_quick_core::{
        Bounds, SESSION_PROBE_SCRIPT, WorkArea, parse_probe_result,
    };
    use leonel_quick_permission::{PermissionProbe, SystemPermissionProbe};
    use leonel_quick_window::{OverlaySurface, WindowError, WindowHost, WindowSpec, parse_request};
    use tao::dpi::{LogicalPosition, LogicalSize};
    use tao::event::{Event, StartCause, WindowEvent};
    use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget};
    use tao::window::{Window, WindowBuilder};
    use tracing::{error, info, warn};
    use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
    use tray_icon::{Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};
    use url::Url;
    use wry::{PageLoadEvent, WebView, WebViewBuilder};

    const WINDOW_TITLE: &str = "Quick by Leonel";
    const FALLBACK_WORK_AREA: WorkArea = WorkArea {
        x: 0,
        y: 0,
        width: 1280,
        height: 800,
    };

    /// Live overlay window with its web view.
    struct NativeOverlay {
        window: Window,
        webview: WebView,
        proxy: EventLoopProxy<LaunchEvent>,
    }

    impl OverlaySurface for NativeOverlay {
        fn is_alive(&self) -> bool {
            // Destruction arrives as `WindowEvent::Destroyed`, which drops us.
            true
        }

        fn is_visible(&self) -> bool {
            self.window.is_visible()
        }

        fn set_bounds(&mut self, bounds: Bounds) {
            self.window
                .set_outer_position(LogicalPosition::new(bounds.x, bounds.y));
            self.window
                .set_inner_size(LogicalSize::new(bounds.width, bounds.height));
        }

        fn show(&mut self) {
            self.window.set_visible(true);
        }

        fn hide(&mut self) {
            self.window.set_visible(false);
        }

        fn focus(&mut self) {
            self.window.set_focus();
        }

        fn set_skip_taskbar(&mut self, skip: bool) {
            #[cfg(windows)]
            {
                use tao::platform::windows::WindowExtWindows;
                let _ = self.window.set_skip_taskbar(skip);
            }

            #[cfg(not(windows))]
            let _ = skip;
        }

        fn load_url(&mut self, url: &Url) {
            if let Err(error) = self.webview.load_url(url.as_str()) {
                warn!(event = "window.load_failed", %error, "web view refused url");
            }
        }

        fn current_url(&self) -> Option<Url> {
            self.webview
                .url()
                .ok()
                .and_then(|raw| Url::parse(&raw).ok())
        }

        fn set_zoom(&mut self, factor: f64) {
            if let Err(error) = self.webview.zoom(factor) {
                warn!(event = "window.zoom_failed", %error, "zoom not applied");
            }
        }

        fn start_drag(&mut self) {
            if let Err(error) = self.window.drag_window() {
                warn!(event = "window.drag_failed", %error, "drag not started");
            }
        }

        fn run_script(&mut self, script: &str) {
            if let Err(error) = self.webview.evaluate_script(script) {
                warn!(event = "window.script_failed", %error, "script not evaluated");
            }
        }

        fn request_session_probe(&mut self) {
            let proxy = self.proxy.clone();
            let result = self
                .webview
                .evaluate_script_with_callback(SESSION_PROBE_SCRIPT, move |raw| {
                    let _ = proxy.send_event(LaunchEvent::SessionProbe(parse_probe_result(&raw)));
                });
            if let Err(error) = result {
                warn!(event = "window.probe_failed", %error, "session probe not evaluated");
            }
        }
    }

    /// Window factory bound to the running event loop.
    struct NativeHost<'a> {
        target: &'a EventLoopWindowTarget<LaunchEvent>,
        proxy: &'a EventLoopProxy<LaunchEvent>,
    }

    impl WindowHost for NativeHost<'_> {
        type Surface = NativeOverlay;

        fn create_surface(&mut self, spec: &WindowSpec) -> Result<NativeOverlay, WindowError> {
            let builder = WindowBuilder::new()
                .with_title(WINDOW_TITLE)
                .with_decorations(spec.decorations)
                .with_always_on_top(spec.always_on_top)
                .with_resizable(true)
                .with_visible(false)
                .with_position(LogicalPosition::new(spec.bounds.x, spec.bounds.y))
                .with_inner_size(LogicalSize::new(spec.bounds.width, spec.bounds.height))
                .with_min_inner_size(LogicalSize::new(spec.min_size.width, spec.min_size.height))
                .with_max_inner_size(LogicalSize::new(spec.max_size.width, spec.max_size.height));

            #[cfg(windows)]
            let builder = {
                use tao::platform::windows::WindowBuilderExtWindows;
                builder.with_skip_taskbar(spec.skip_taskbar)
            };

            let window = builder
                .build(self.target)
                .map_err(|error| WindowError::Create(error.to_string()))?;

            let ipc_proxy = self.proxy.clone();
            let popup_proxy = self.proxy.clone();
            let load_proxy = self.proxy.clone();
            let webview = WebViewBuilder::new()
                .with_url(spec.initial_url.as_str())
                .with_initialization_script(spec.init_script)
                .with_ipc_handler(move |request: wry::http::Request<String>| {
                    match parse_request(request.body()) {
                        Ok(message) => {
                            let _ = ipc_proxy.send_event(LaunchEvent::Bridge(message));
                        }
                        Err(error) => {
                            warn!(event = "bridge.rejected", %error, "page message ignored");
                        }
                    }
                })
                .with_new_window_req_handler(move |url: String| {
                    let _ = popup_proxy.send_event(LaunchEvent::NewWindow(url));
                    false
                })
                .with_on_page_load_handler(move |event, _url| {
                    if let PageLoadEvent::Finished = event {
                        let _ = load_proxy.send_event(LaunchEvent::PageLoaded);
                    }
                })
                .build(&window)
                .map_err(|error| WindowError::Create(error.to_string()))?;

            Ok(NativeOverlay {
                window,
                webview,
                proxy: self.proxy.clone(),
            })
        }

        fn primary_work_area(&self) -> WorkArea {
            let Some(monitor) = self.target.primary_monitor() else {
                return system_work_area(1.0).unwrap_or(FALLBACK_WORK_AREA);
            };
            let scale = monitor.scale_factor();
            if let Some(work_area) = system_work_area(scale) {
                return work_area;
            }
            let position = monitor.position().to_logical::<i32>(scale);
            let size = monitor.size().to_logical::<u32>(scale);
            WorkArea {
                x: position.x,
                y: position.y,
                width: size.width,
                height: size.height,
            }
        }

        fn open_external(&mut self, url: &Url) {
            if let Err(error) = open::that(url.as_str()) {
                warn!(event = "window.open_external_failed", %error, "browser not opened");
            }
        }
    }

    /// Logging, single-instance check, then the event loop. Returns only on
    /// startup failure or when this launch was forwarded.
    pub fn start(config: ShellConfig) -> Result<(), AppError> {
        let log_dir = match &config.log_dir {
            Some(dir) => dir.clone(),
            None => executable_dir()?,
        };
        if let Err(error) = init_logging(&log_dir) {
            eprintln!("logging unavailable: {error}");
        }
        install_panic_hook();

        let args: Vec<String> = std::env::args().collect();
        info!(
            event = "launch.start",
            version = leonel_quick_app::app_version(),
            args = ?redact_args(&args),
            "leonel-quick starting"
        );

        let listener = match acquire(config.instance_port, &args) {
            Ok(InstanceRole::Secondary) => {
                info!(event = "launch.secondary", "another instance is running; exiting");
                return Ok(());
            }
            Ok(InstanceRole::Primary(listener)) => Some(listener),
            Err(error) => {
                warn!(
                    event = "launch.instance_unavailable",
                    %error,
                    "single-instance lock unavailable; running without it"
                );
                None
            }
        };

        if let Err(error) = register_protocol_handler() {
            warn!(event = "protocol.register_failed", %error, "scheme handler not registered");
        }

        run(config, listener, args)
    }

    fn run(
        config: ShellConfig,
        listener: Option<leonel_quick_app::InstanceListener>,
        args: Vec<String>,
    ) -> Result<(), AppError> {
        #[allow(unused_mut)]
        let mut event_loop = EventLoopBuilder::<LaunchEvent>::with_user_event().build();

        #[cfg(target_os = "macos")]
        {
            use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};
            event_loop.set_activation_policy(ActivationPolicy::Accessory);
        }

        let proxy = event_loop.create_proxy();

        if let Some(listener) = listener {
            let instance_proxy = proxy.clone();
            listener.spawn(move |forwarded| {
                let _ = instance_proxy.send_event(LaunchEvent::SecondInstance(forwarded));
            })?;
        }

        let permission: Arc<dyn PermissionProbe> = Arc::new(SystemPermissionProbe::new());
        let capturer =
            ScreenshotCapturer::new(Arc::clone(&permission), Arc::new(RealSourceProvider::new()))
                .with_enabled(config.capture_enabled);
        let worker_proxy = proxy.clone();
        let worker = CaptureWorker::spawn(capturer, move |completed| {
            let _ = worker_proxy.send_event(LaunchEvent::CaptureCompleted(completed));
        })?;
        let mut dispatcher: Dispatcher<NativeOverlay> =
            Dispatcher::new(config.routes.clone(), permission, Box::new(worker));

        let open_item = MenuItem::new("Open", true, None);
        let reload_item = MenuItem::new("Reload", true, None);
        let quit_item = MenuItem::new("Quit", true, None);
        let menu = Menu::new();
        menu.append(&open_item)
            .and_then(|()| menu.append(&reload_item))
            .and_then(|()| menu.append(&PredefinedMenuItem::separator()))
            .and_then(|()| menu.append(&quit_item))
            .map_err(|error| AppError::Shell(format!("tray menu: {error}")))?;

        let (open_id, reload_id, quit_id) = (
            open_item.id().clone(),
            reload_item.id().clone(),
            quit_item.id().clone(),
        );
        let menu_proxy = proxy.clone();
        MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
            let launch = if event.id == open_id {
                LaunchEvent::Toggle(ToggleSource::TrayMenu)
            } else if event.id == reload_id {
                LaunchEvent::Reload
            } else if event.id == quit_id {
                LaunchEvent::Quit
            } else {
                return;
            };
            let _ = menu_proxy.send_event(launch);
        }));

        let tray_proxy = proxy.clone();
        TrayIconEvent::set_event_handler(Some(move |event: TrayIconEvent| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                let _ = tray_proxy.send_event(LaunchEvent::Toggle(ToggleSource::TrayClick));
            }
        }));

        let hotkey_manager = GlobalHotKeyManager::new()
            .map_err(|error| AppError::Shell(format!("hotkey manager: {error}")))?;
        let hotkey = to_hotkey(&config.shortcut)?;
        let hotkey_id = hotkey.id();
        let hotkey_proxy = proxy.clone();
        GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
            if event.id == hotkey_id && event.state == HotKeyState::Pressed {
                let _ = hotkey_proxy.send_event(LaunchEvent::Toggle(ToggleSource::Hotkey));
            }
        }));

        let tooltip = tray_tooltip(&config.shortcut);
        let mut tray: Option<TrayIcon> = None;
        let mut hotkey_registered = false;

        event_loop.run(move |event, target, control_flow| {
            *control_flow = ControlFlow::Wait;
            let mut host = NativeHost {
                target,
                proxy: &proxy,
            };

            match event {
                Event::NewEvents(StartCause::Init) => {
                    tray = build_tray(&menu, &tooltip);
                    hotkey_registered = match hotkey_manager.register(hotkey) {
                        Ok(()) => {
                            info!(event = "launch.hotkey_registered", shortcut = %config.shortcut, "global shortcut registered");
                            true
                        }
                        Err(error) => {
                            warn!(event = "launch.hotkey_failed", %error, "global shortcut unavailable");
                            false
                        }
                    };
                    contain("startup", || dispatcher.on_ready(&mut host, &args));
                }
                #[cfg(target_os = "macos")]
                Event::Opened { urls } => {
                    for url in urls {
                        let launch = LaunchEvent::DeepLink(url.to_string());
                        contain("deep_link", || dispatcher.dispatch(&mut host, launch));
                    }
                }
                Event::UserEvent(launch) => {
                    let flow = contain("dispatch", || dispatcher.dispatch(&mut host, launch));
                    if flow == Some(Flow::Exit) {
                        *control_flow = ControlFlow::Exit;
                    }
                }
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => {
                    contain("close", || {
                        dispatcher.dispatch(&mut host, LaunchEvent::CloseRequested)
                    });
                }
                Event::WindowEvent {
                    event: WindowEvent::Destroyed,
                    ..
                } => {
                    contain("destroyed", || {
                        dispatcher.dispatch(&mut host, LaunchEvent::WindowDestroyed)
                    });
                }
                Event::LoopDestroyed => {
                    if hotkey_registered {
                        if let Err(error) = hotkey_manager.unregister(hotkey) {
                            warn!(event = "launch.hotkey_unregister_failed", %error, "shortcut not released");
                        }
                    }
                    dispatcher.shutdown();
                    tray.take();
                    info!(event = "launch.exit", "leonel-quick exiting");
                }
                _ => {}
            }
        })
    }

    fn to_hotkey(shortcut: &Shortcut) -> Result<HotKey, AppError> {
        let code = Code::from_str(&shortcut.code_name())
            .map_err(|_| AppError::Config(format!("unsupported key {}", shortcut.code_name())))?;
        let mut modifiers = Modifiers::empty();
        if shortcut.uses_control() {
            modifiers |= Modifiers::CONTROL;
        }
        if shortcut.alt {
            modifiers |= Modifiers::ALT;
        }
        if shortcut.shift {
            modifiers |= Modifiers::SHIFT;
        }
        if shortcut.uses_super() {
            modifiers |= Modifiers::SUPER;
        }
        let modifiers = (!modifiers.is_empty()).then_some(modifiers);
        Ok(HotKey::new(modifiers, code))
    }

    fn build_tray(menu: &Menu, tooltip: &str) -> Option<TrayIcon> {
        let icon = match tray_icon_image() {
            Ok(icon) => icon,
            Err(error) => {
                error!(event = "launch.tray_icon_failed", %error, "tray icon image rejected");
                return None;
            }
        };
        match TrayIconBuilder::new()
            .with_menu(Box::new(menu.clone()))
            .with_tooltip(tooltip)
            .with_icon(icon)
            .build()
        {
            Ok(tray) => Some(tray),
            Err(error) => {
                error!(event = "launch.tray_failed", %error, "tray icon not created");
                None
            }
        }
    }

    fn tray_icon_image() -> Result<Icon, tray_icon::BadIcon> {
        const SIZE: u32 = 32;
        let mut rgba = Vec::with_capacity((SIZE * SIZE * 4) as usize);
        let center = (SIZE as f32 - 1.0) / 2.0;
        for y in 0..SIZE {
            for x in 0..SIZE {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                let distance = (dx * dx + dy * dy).sqrt();
                let in_disc = distance <= center;
                // Letter "L" knocked out of the disc.
                let in_letter = (11..=14).contains(&x) && (8..=23).contains(&y)
                    || (11..=21).contains(&x) && (20..=23).contains(&y);
                let alpha = if in_disc && !in_letter { 255 } else { 0 };
                rgba.extend_from_slice(&[0x4f, 0x46, 0xe5, alpha]);
            }
        }
        Icon::from_rgba(rgba, SIZE, SIZE)
    }
}

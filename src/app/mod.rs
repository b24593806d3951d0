use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context, CursorIcon, PointerButton, Sense, Ui, Vec2};
use tracing::{info, warn};

use crate::layout::{FrameLoop, LayoutConfig, LayoutError, LiveSimulation, create_live_simulation};
use crate::publish::{LoadedGraph, Metadata, fetch_graph_document};

mod camera;
mod draw;
mod theme;
mod ui;
mod view;

use camera::WHEEL_ZOOM_FACTOR;
use draw::{DrawStats, draw_graph};
use theme::Palette;
use view::{GraphView, bounds_center, node_positions};

#[derive(Clone, Debug)]
pub struct GraphSource {
    pub primary: PathBuf,
    pub fallback: Option<PathBuf>,
}

pub struct GraphApp {
    source: GraphSource,
    layout: LayoutConfig,
    night: bool,
    state: AppState,
    reload_rx: Option<Receiver<Result<LoadedGraph, String>>>,
}

enum AppState {
    Loading {
        rx: Receiver<Result<LoadedGraph, String>>,
    },
    Ready(Box<Explorer>),
    Error(String),
}

struct LiveLayout {
    simulation: LiveSimulation,
    latest: Rc<RefCell<Option<Vec<Vec2>>>>,
}

struct Explorer {
    view: GraphView,
    frames: FrameLoop,
    live: Option<LiveLayout>,
    metadata: Option<Metadata>,
    night: bool,
    search: String,
    search_missed: bool,
    reload_requested: bool,
    stats: DrawStats,
}

impl GraphApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        source: GraphSource,
        night: bool,
        layout: LayoutConfig,
    ) -> Self {
        let state = Self::start_load(&source);
        Self {
            source,
            layout,
            night,
            state,
            reload_rx: None,
        }
    }

    fn start_load(source: &GraphSource) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(source),
        }
    }

    fn spawn_load(source: &GraphSource) -> Receiver<Result<LoadedGraph, String>> {
        let (tx, rx) = mpsc::channel();
        let source = source.clone();

        thread::spawn(move || {
            let result = fetch_graph_document(&source.primary, source.fallback.as_deref())
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn ready(&self, loaded: LoadedGraph) -> AppState {
        match Explorer::new(loaded, self.night, self.layout) {
            Ok(explorer) => AppState::Ready(Box::new(explorer)),
            Err(error) => AppState::Error(format!("Cannot lay out this graph: {error}")),
        }
    }
}

impl eframe::App for GraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;
        let mut retry = false;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(loaded)) => transition = Some(Ok(loaded)),
                    Ok(Err(error)) => transition = Some(Err(error)),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(Err("Background load worker disconnected".to_owned()));
                    }
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        retry = true;
                    }
                });
            }
            AppState::Ready(explorer) => {
                explorer.show(ctx);
                self.night = explorer.night;

                if std::mem::take(&mut explorer.reload_requested) && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(&self.source));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(loaded)) => {
                            if let Err(error) = explorer.reload(loaded, self.layout) {
                                transition = Some(Err(format!("Cannot lay out this graph: {error}")));
                            }
                        }
                        Ok(Err(error)) => transition = Some(Err(error)),
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(Err("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if retry {
            info!("retrying graph load");
            self.reload_rx = None;
            self.state = Self::start_load(&self.source);
        }

        match transition {
            Some(Ok(loaded)) => self.state = self.ready(loaded),
            Some(Err(error)) => {
                warn!(error = %error, "graph load failed");
                self.state = AppState::Error(error);
            }
            None => {}
        }
    }
}

impl Explorer {
    fn new(loaded: LoadedGraph, night: bool, layout: LayoutConfig) -> Result<Self, LayoutError> {
        let needs_layout = loaded.needs_layout();
        let LoadedGraph { graph, metadata } = loaded;
        let frames = FrameLoop::new();

        if !needs_layout {
            let positions = node_positions(&graph.nodes);
            let anchor = bounds_center(&positions);
            return Ok(Self::with_view(
                GraphView::new(graph.nodes, &graph.edges, positions, anchor),
                frames,
                None,
                metadata,
                night,
            ));
        }

        let latest = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&latest);
        let simulation = create_live_simulation(
            graph.nodes.clone(),
            &graph.edges,
            layout,
            &frames,
            move |simulation| {
                *sink.borrow_mut() = Some(simulation.positions().to_vec());
            },
        )?;
        let positions = simulation.with_simulation(|simulation| simulation.positions().to_vec());
        info!(nodes = positions.len(), "graph has no coordinates, laying it out live");

        Ok(Self::with_view(
            GraphView::new(graph.nodes, &graph.edges, positions, layout.center()),
            frames,
            Some(LiveLayout { simulation, latest }),
            metadata,
            night,
        ))
    }

    fn with_view(
        view: GraphView,
        frames: FrameLoop,
        live: Option<LiveLayout>,
        metadata: Option<Metadata>,
        night: bool,
    ) -> Self {
        Self {
            view,
            frames,
            live,
            metadata,
            night,
            search: String::new(),
            search_missed: false,
            reload_requested: false,
            stats: DrawStats::default(),
        }
    }

    fn reload(&mut self, loaded: LoadedGraph, layout: LayoutConfig) -> Result<(), LayoutError> {
        let camera = self.view.camera;

        if loaded.needs_layout()
            && let Some(live) = &mut self.live
        {
            let LoadedGraph { graph, metadata } = loaded;
            live.simulation.replace_graph(graph.nodes.clone(), &graph.edges);
            let positions =
                live.simulation.with_simulation(|simulation| simulation.positions().to_vec());
            live.latest.borrow_mut().take();
            self.view = GraphView::new(graph.nodes, &graph.edges, positions, layout.center());
            self.metadata = metadata;
        } else {
            let fresh = Self::new(loaded, self.night, layout)?;
            self.view = fresh.view;
            self.frames = fresh.frames;
            self.live = fresh.live;
            self.metadata = fresh.metadata;
        }

        self.view.camera.zoom = camera.zoom;
        self.view.camera.pan = camera.pan;
        info!(nodes = self.view.nodes().len(), "graph reloaded");
        Ok(())
    }

    fn show(&mut self, ctx: &Context) {
        self.frames.run_frame();
        if let Some(live) = &self.live {
            if let Some(positions) = live.latest.borrow_mut().take() {
                self.view.set_positions(&positions);
            }
        }
        if self.frames.pending() > 0 {
            ctx.request_repaint();
        }

        ctx.set_visuals(Palette::visuals(self.night));

        egui::TopBottomPanel::top("toolbar")
            .resizable(false)
            .show(ctx, |ui| self.draw_toolbar(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_canvas(ui));
    }

    fn draw_canvas(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.view.camera.set_viewport(rect);

        if response.dragged_by(PointerButton::Primary) {
            self.view.camera.pan_by(response.drag_delta());
        }
        if response.double_clicked() {
            self.view.camera.reset();
        }

        if response.hovered() {
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            if scroll.abs() > f32::EPSILON {
                let pointer = response.hover_pos().unwrap_or_else(|| rect.center());
                let factor = if scroll > 0.0 {
                    WHEEL_ZOOM_FACTOR
                } else {
                    1.0 / WHEEL_ZOOM_FACTOR
                };
                self.view.camera.zoom_at(pointer, factor);
            }
        }

        let pointer_moved = ui.input(|input| input.pointer.delta() != Vec2::ZERO);
        if pointer_moved && !response.dragged() {
            let hovered = response.hover_pos().and_then(|pointer| {
                let graph = self.view.camera.screen_to_graph(pointer);
                self.view.find_node_at(graph)
            });
            self.view.set_hovered(hovered);
        }
        if response.hovered() && self.view.hovered().is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = CursorIcon::PointingHand;
            });
        }

        let palette = Palette::for_mode(self.night);
        let painter = ui.painter_at(rect);
        self.stats = draw_graph(&painter, &self.view, &palette);
        self.draw_hover_card(&painter, &palette);
    }
}

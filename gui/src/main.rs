mod progress;
mod state;
mod worker;

use std::sync::Arc;

use engine::{
    fanout::log_event, load_product_groups, load_stores, spawn_fan_out, ClientConfig,
    EngineError, FanOutEvent, HttpBackend, JobController, JobEvent, JobRun, Loaded, ProductGroup,
    Store,
};
use iced::widget::{
    button, checkbox, column, container, pick_list, progress_bar, row, scrollable, text,
    text_input, Column,
};
use iced::{executor, Alignment, Application, Command, Element, Length, Settings, Theme};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use progress::ProgressView;
use state::AppState;
use worker::{DialogSink, Pump};

#[derive(Debug, thiserror::Error)]
pub enum GuiError {
    #[error("Configuration error: {0}")]
    Config(#[from] EngineError),
    #[error("Window error: {0}")]
    Window(#[from] iced::Error),
}

pub fn main() -> Result<(), GuiError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockplan_gui=info,engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!(backend = %config.backend_url, "Starting report GUI");
    GuiApp::run(Settings::with_flags(config))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub enum Message {
    StoresLoaded(Loaded<Store>),
    GroupsLoaded(Loaded<ProductGroup>),
    ReloadPressed,
    StartDateChanged(String),
    EndDateChanged(String),
    PlanningDaysChanged(String),
    SearchDaysChanged(String),
    StoreSelected(Store),
    GroupToggled(String, bool),
    GeneratePressed,
    CancelPressed,
    JobEventReceived(Uuid, Option<JobEvent>),
    ProcessAllPressed,
    StopProcessingPressed,
    FanOutEventReceived(Uuid, Option<FanOutEvent>),
}

pub struct GuiApp {
    state: AppState,
    config: ClientConfig,
    backend: Arc<HttpBackend>,
    controller: JobController<HttpBackend, DialogSink>,
    job_events: Option<Pump<JobEvent>>,
    fan_out_events: Option<Pump<FanOutEvent>>,
}

impl GuiApp {
    fn load_reference_data(&self) -> Command<Message> {
        let stores_backend = Arc::clone(&self.backend);
        let groups_backend = Arc::clone(&self.backend);
        Command::batch([
            Command::perform(
                async move { load_stores(stores_backend.as_ref()).await },
                Message::StoresLoaded,
            ),
            Command::perform(
                async move { load_product_groups(groups_backend.as_ref()).await },
                Message::GroupsLoaded,
            ),
        ])
    }

    fn next_job_event(pump: &Pump<JobEvent>) -> Command<Message> {
        Command::perform(pump.next(), |(id, event)| Message::JobEventReceived(id, event))
    }

    fn next_fan_out_event(pump: &Pump<FanOutEvent>) -> Command<Message> {
        Command::perform(pump.next(), |(id, event)| {
            Message::FanOutEventReceived(id, event)
        })
    }

    fn start_report(&mut self) -> Command<Message> {
        if self.controller.is_processing() {
            return Command::none();
        }

        let params = match self.state.form.to_report_params() {
            Ok(params) => params,
            Err(e) => {
                self.state.show_error(e.to_string());
                return Command::none();
            }
        };

        self.state.status = None;
        match self.controller.submit(params) {
            Some(JobRun { job_id, events, .. }) => {
                let pump = Pump::new(job_id, events);
                let command = Self::next_job_event(&pump);
                self.job_events = Some(pump);
                command
            }
            None => Command::none(),
        }
    }

    fn on_job_event(&mut self, pump_id: Uuid, event: Option<JobEvent>) -> Command<Message> {
        let Some(pump) = self.job_events.as_ref().filter(|p| p.id() == pump_id) else {
            return Command::none();
        };

        let Some(event) = event else {
            self.job_events = None;
            return Command::none();
        };

        let terminal = event.kind.is_terminal();
        let next = if terminal {
            Command::none()
        } else {
            Self::next_job_event(pump)
        };

        if let Some(outcome) = self.controller.handle_event(event) {
            self.state.apply_outcome(&outcome);
        }
        if terminal {
            self.job_events = None;
        }
        next
    }

    fn start_fan_out(&mut self) -> Command<Message> {
        if self.state.fan_out.is_running() {
            return Command::none();
        }

        let params = match self.state.form.to_process_params() {
            Ok(params) => params,
            Err(e) => {
                self.state.show_error(e.to_string());
                return Command::none();
            }
        };

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let fan_out = spawn_fan_out(
            Arc::clone(&self.backend),
            self.state.store_ids(),
            params,
            self.config.fan_out_delay,
            cancel.clone(),
        );
        tracing::info!(%run_id, stores = self.state.stores.len(), "Processing all stores");

        self.state.fan_out.start(run_id, cancel);
        let pump = Pump::new(run_id, fan_out.events);
        let command = Self::next_fan_out_event(&pump);
        self.fan_out_events = Some(pump);
        command
    }

    fn on_fan_out_event(&mut self, run_id: Uuid, event: Option<FanOutEvent>) -> Command<Message> {
        let Some(pump) = self.fan_out_events.as_ref().filter(|p| p.id() == run_id) else {
            return Command::none();
        };

        match event {
            Some(event) => {
                log_event(&event);
                self.state.fan_out.apply(run_id, &event);
                Self::next_fan_out_event(pump)
            }
            None => {
                self.state.fan_out.finish(run_id);
                self.fan_out_events = None;
                Command::none()
            }
        }
    }

    fn form_view(&self) -> Element<Message> {
        let form = &self.state.form;
        let busy = self.controller.is_processing();

        let dates = row![
            column![
                text("Start date"),
                text_input("YYYY-MM-DD", &form.start_date).on_input(Message::StartDateChanged),
            ]
            .spacing(5)
            .width(Length::FillPortion(1)),
            column![
                text("End date"),
                text_input("YYYY-MM-DD", &form.end_date).on_input(Message::EndDateChanged),
            ]
            .spacing(5)
            .width(Length::FillPortion(1)),
        ]
        .spacing(15);

        let days = row![
            column![
                text("Planning days"),
                text_input("30", &form.planning_days).on_input(Message::PlanningDaysChanged),
            ]
            .spacing(5)
            .width(Length::FillPortion(1)),
            column![
                text("Search days"),
                text_input("30", &form.search_days).on_input(Message::SearchDaysChanged),
            ]
            .spacing(5)
            .width(Length::FillPortion(1)),
        ]
        .spacing(15);

        let store = row![
            text("Store"),
            pick_list(
                self.state.stores.clone(),
                self.state.selected_store.clone(),
                Message::StoreSelected,
            )
            .placeholder("Select a store")
            .width(Length::Fill),
            button("Reload").on_press(Message::ReloadPressed),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        let groups = ProductGroup::flatten(&self.state.groups).into_iter().fold(
            Column::new().spacing(4),
            |col, entry| {
                let id = entry.group.id.clone();
                let checked = form.is_group_selected(&id);
                col.push(
                    checkbox(entry.label(), checked)
                        .on_toggle(move |on| Message::GroupToggled(id.clone(), on)),
                )
            },
        );

        let actions = row![
            button(if busy { "Generating..." } else { "Generate report" })
                .on_press_maybe((!busy).then_some(Message::GeneratePressed))
                .padding(10),
            button("Cancel")
                .on_press_maybe(busy.then_some(Message::CancelPressed))
                .padding(10),
        ]
        .spacing(10);

        column![
            dates,
            days,
            store,
            text("Product groups"),
            scrollable(groups).height(Length::Fixed(160.0)),
            actions,
        ]
        .spacing(10)
        .padding(10)
        .into()
    }

    fn progress_view(&self) -> Element<Message> {
        let view = ProgressView::of(self.controller.session());
        if !view.visible {
            return text("").into();
        }

        column![
            progress_bar(0.0..=100.0, view.percent),
            text(view.text),
        ]
        .spacing(5)
        .padding(10)
        .into()
    }

    fn messages_view(&self) -> Element<Message> {
        let mut col = Column::new().spacing(5).padding(10);
        for notice in &self.state.notices {
            col = col.push(text(format!("NOTICE: {}", notice)));
        }
        if let Some(status) = &self.state.status {
            let line = if status.is_error {
                format!("ERROR: {}", status.message)
            } else {
                status.message.clone()
            };
            col = col.push(container(text(line)));
        }
        col.into()
    }

    fn fan_out_view(&self) -> Element<Message> {
        let log = &self.state.fan_out;
        let running = log.is_running();

        let controls = row![
            button("Process all stores")
                .on_press_maybe((!running).then_some(Message::ProcessAllPressed)),
            button("Stop").on_press_maybe(running.then_some(Message::StopProcessingPressed)),
            text(format!("Done: {} | Failed: {}", log.succeeded, log.failed)),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        let lines = log
            .lines
            .iter()
            .fold(Column::new().spacing(2), |col, line| col.push(text(line)));

        column![controls, scrollable(lines).height(Length::Fixed(140.0))]
            .spacing(10)
            .padding(10)
            .into()
    }
}

impl Application for GuiApp {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ClientConfig;

    fn new(config: ClientConfig) -> (Self, Command<Message>) {
        let backend = Arc::new(HttpBackend::from_config(&config));
        let controller = JobController::new(Arc::clone(&backend), DialogSink, config.poll_interval);
        let app = GuiApp {
            state: AppState::new(),
            config,
            backend,
            controller,
            job_events: None,
            fan_out_events: None,
        };
        let command = app.load_reference_data();
        (app, command)
    }

    fn title(&self) -> String {
        "Stockplan - Report Generator".to_string()
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::StoresLoaded(loaded) => {
                self.state.apply_stores(loaded);
                Command::none()
            }
            Message::GroupsLoaded(loaded) => {
                self.state.apply_groups(loaded);
                Command::none()
            }
            Message::ReloadPressed => {
                self.state.clear_messages();
                self.load_reference_data()
            }
            Message::StartDateChanged(value) => {
                self.state.form.start_date = value;
                Command::none()
            }
            Message::EndDateChanged(value) => {
                self.state.form.end_date = value;
                Command::none()
            }
            Message::PlanningDaysChanged(value) => {
                self.state.form.planning_days = value;
                Command::none()
            }
            Message::SearchDaysChanged(value) => {
                self.state.form.search_days = value;
                Command::none()
            }
            Message::StoreSelected(store) => {
                self.state.select_store(store);
                Command::none()
            }
            Message::GroupToggled(id, selected) => {
                self.state.form.set_group(&id, selected);
                Command::none()
            }
            Message::GeneratePressed => self.start_report(),
            Message::CancelPressed => {
                if let Some(outcome) = self.controller.cancel() {
                    self.state.apply_outcome(&outcome);
                }
                Command::none()
            }
            Message::JobEventReceived(id, event) => self.on_job_event(id, event),
            Message::ProcessAllPressed => self.start_fan_out(),
            Message::StopProcessingPressed => {
                self.state.fan_out.stop();
                Command::none()
            }
            Message::FanOutEventReceived(id, event) => self.on_fan_out_event(id, event),
        }
    }

    fn view(&self) -> Element<Message> {
        column![
            text("Stock Planning Report").size(24),
            self.form_view(),
            self.progress_view(),
            self.messages_view(),
            text("All stores").size(18),
            self.fan_out_view(),
        ]
        .spacing(20)
        .padding(20)
        .into()
    }
}

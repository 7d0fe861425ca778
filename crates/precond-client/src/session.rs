//! Preconditioning session orchestration

use std::future::Future;

use futures::future::join_all;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use precond_core::{
    Command, CommandResult, PrecondError, ResolvedVehicle, Result, SeatHeaterSetting,
};

use crate::dispatcher::CommandDispatcher;
use crate::resolver::VehicleResolver;
use crate::wake::WakeOrchestrator;

/// What the caller asked for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreconditionRequest {
    pub vin: String,
    /// Cabin set point in Celsius
    pub temperature: Option<f64>,
    /// Seat heater levels aligned by seat position; `None` leaves a seat untouched
    pub seats: Vec<Option<u8>>,
}

impl PreconditionRequest {
    fn seat_settings(&self) -> impl Iterator<Item = SeatHeaterSetting> + '_ {
        self.seats.iter().enumerate().filter_map(|(position, level)| {
            Some(SeatHeaterSetting {
                position: u8::try_from(position).ok()?,
                level: (*level)?,
            })
        })
    }
}

/// Runs one session: resolve, wake, start climate, set temperature, set seats
pub struct SessionController {
    dispatcher: CommandDispatcher,
    resolver: VehicleResolver,
    wake: WakeOrchestrator,
}

impl SessionController {
    pub fn new(
        dispatcher: CommandDispatcher,
        resolver: VehicleResolver,
        wake: WakeOrchestrator,
    ) -> Self {
        Self {
            dispatcher,
            resolver,
            wake,
        }
    }

    /// Run the session and render its outcome as the user-facing message.
    ///
    /// Never fails: errors come back as `Error: <message>`.
    pub async fn run(&self, request: &PreconditionRequest) -> String {
        let span = info_span!("session", session_id = %Uuid::new_v4(), vin = %request.vin);

        async {
            match self.execute(request).await {
                Ok(message) => {
                    info!(%message, "Session complete");
                    message
                }
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "Session failed");
                    format!("Error: {}", e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run the session, returning the success message or the first fatal error
    pub async fn execute(&self, request: &PreconditionRequest) -> Result<String> {
        let mut vehicle = self
            .resolver
            .resolve_with_state(&self.dispatcher, &request.vin)
            .await?;

        if vehicle.reported_online() {
            info!("Vehicle already online, skipping wake");
        } else {
            self.stage(&mut vehicle, |id| async move {
                self.wake.wake(&self.dispatcher, &id).await
            })
            .await?;
        }

        info!("Starting climate");
        self.stage(&mut vehicle, |id| async move {
            self.dispatcher
                .send_command(&id, &Command::start_climate())
                .await
        })
        .await?;

        let mut message = String::from("Car is preconditioning");

        if let Some(temperature) = request.temperature {
            info!(temperature, "Setting temperature");
            self.stage(&mut vehicle, |id| async move {
                self.dispatcher
                    .send_command(&id, &Command::set_temperature(temperature))
                    .await
            })
            .await?;
            message.push_str(&format!(" to {}C", temperature));
        }

        let seats = self.set_seats(&vehicle.internal_id, request).await;
        if !seats.is_empty() {
            let failed: Vec<&str> = seats
                .iter()
                .filter(|result| !result.succeeded)
                .map(|result| result.message.as_str())
                .collect();

            if failed.is_empty() {
                message.push_str(", and the seats have been set.");
            } else {
                message.push_str(", but some seats failed: ");
                message.push_str(&failed.join("; "));
            }
        }

        Ok(message)
    }

    /// Issue every seat heater command concurrently and collect each outcome
    async fn set_seats(&self, vehicle_id: &str, request: &PreconditionRequest) -> Vec<CommandResult> {
        let commands = request.seat_settings().map(|seat| async move {
            let result = self
                .dispatcher
                .send_command(vehicle_id, &Command::set_seat_heater(seat))
                .await;
            match result {
                Ok(_) => CommandResult::ok(format!("seat {}", seat.position)),
                Err(e) => {
                    warn!(seat = seat.position, error = %e, "Seat heater command failed");
                    CommandResult::failed(format!("seat {} ({})", seat.position, e))
                }
            }
        });

        join_all(commands).await
    }

    /// Run one stage against the current internal id.
    ///
    /// On `StaleVehicleId` the cached id is dropped, the VIN resolved again and
    /// the stage retried once with the new id.
    async fn stage<T, F, Fut>(&self, vehicle: &mut ResolvedVehicle, run: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match run(vehicle.internal_id.clone()).await {
            Err(PrecondError::StaleVehicleId { vehicle_id }) => {
                warn!(%vehicle_id, "Vehicle id is stale, resolving again");
                self.resolver.invalidate(&vehicle.vin).await?;
                *vehicle = self
                    .resolver
                    .resolve_with_state(&self.dispatcher, &vehicle.vin)
                    .await?;
                run(vehicle.internal_id.clone()).await
            }
            other => other,
        }
    }
}

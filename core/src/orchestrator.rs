//! Chain-load orchestrator
//!
//! # State Machine Flow
//! ```text
//! IdentifyBootDevice → RemediateBlockingDrivers → LoadDriverImage
//!   → VerifyAndStartDriver → DiscoverTargetPartition → EnsureFileSystemService
//!   → OpenVolume (retried) → ResolveLoaderPathCase → LoadFinalImage
//!   → StartFinalImage → Done
//! ```
//!
//! Each step owns what the previous steps produced, so a later stage can
//! never run without its inputs. The first fatal error ends the run.

use core::fmt;

use log::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::discovery::find_target_partition;
use crate::driver::{
    disconnect_blocking_drivers, ensure_file_system, load_driver, verify_and_start, ServiceState,
};
use crate::error::{RelayError, Result};
use crate::firmware::{describe_path, Firmware};
use crate::path::EfiPath;
use crate::resolver::resolve_path_case;
use crate::status::Status;

/// Orchestrator stage, for logging and failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    IdentifyBootDevice,
    RemediateBlockingDrivers,
    LoadDriverImage,
    VerifyAndStartDriver,
    DiscoverTargetPartition,
    EnsureFileSystemService,
    OpenVolume,
    ResolveLoaderPathCase,
    LoadFinalImage,
    StartFinalImage,
    Done,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::IdentifyBootDevice => "IdentifyBootDevice",
            Self::RemediateBlockingDrivers => "RemediateBlockingDrivers",
            Self::LoadDriverImage => "LoadDriverImage",
            Self::VerifyAndStartDriver => "VerifyAndStartDriver",
            Self::DiscoverTargetPartition => "DiscoverTargetPartition",
            Self::EnsureFileSystemService => "EnsureFileSystemService",
            Self::OpenVolume => "OpenVolume",
            Self::ResolveLoaderPathCase => "ResolveLoaderPathCase",
            Self::LoadFinalImage => "LoadFinalImage",
            Self::StartFinalImage => "StartFinalImage",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<H> {
    /// Device the driver was loaded from.
    pub boot_device: H,
    pub partition: H,
    pub service: ServiceState,
    /// Exact-case path of the loader that was started.
    pub loader_path: EfiPath,
    pub disconnected: usize,
    pub volume_attempts: u32,
}

/// One stage plus the inputs it needs.
enum Step<F: Firmware> {
    IdentifyBootDevice,
    RemediateBlockingDrivers {
        boot: Option<F::Handle>,
    },
    LoadDriverImage {
        boot: Option<F::Handle>,
    },
    VerifyAndStartDriver {
        boot: F::Handle,
        driver: F::Handle,
    },
    DiscoverTargetPartition {
        boot: F::Handle,
        driver: F::Handle,
    },
    EnsureFileSystemService {
        boot: F::Handle,
        driver: F::Handle,
        partition: F::Handle,
    },
    OpenVolume {
        target: Target<F::Handle>,
        attempt: u32,
    },
    ResolveLoaderPathCase {
        target: Target<F::Handle>,
        root: F::Dir,
    },
    LoadFinalImage {
        target: Target<F::Handle>,
        path: EfiPath,
    },
    StartFinalImage {
        target: Target<F::Handle>,
        path: EfiPath,
        image: F::Handle,
    },
}

impl<F: Firmware> Step<F> {
    fn stage(&self) -> Stage {
        match self {
            Self::IdentifyBootDevice => Stage::IdentifyBootDevice,
            Self::RemediateBlockingDrivers { .. } => Stage::RemediateBlockingDrivers,
            Self::LoadDriverImage { .. } => Stage::LoadDriverImage,
            Self::VerifyAndStartDriver { .. } => Stage::VerifyAndStartDriver,
            Self::DiscoverTargetPartition { .. } => Stage::DiscoverTargetPartition,
            Self::EnsureFileSystemService { .. } => Stage::EnsureFileSystemService,
            Self::OpenVolume { .. } => Stage::OpenVolume,
            Self::ResolveLoaderPathCase { .. } => Stage::ResolveLoaderPathCase,
            Self::LoadFinalImage { .. } => Stage::LoadFinalImage,
            Self::StartFinalImage { .. } => Stage::StartFinalImage,
        }
    }
}

/// The partition we are booting into.
#[derive(Debug, Clone, Copy)]
struct Target<H> {
    boot: H,
    partition: H,
    service: ServiceState,
}

/// Result of a single step.
enum StepResult<F: Firmware> {
    /// Same stage again.
    Continue(Step<F>),
    /// Next stage.
    Transition(Step<F>),
    /// Final image returned control.
    Finished(Outcome<F::Handle>),
}

pub struct Chainloader<'a, F: Firmware> {
    fw: &'a F,
    config: RelayConfig,
    stage: Stage,
    disconnected: usize,
    volume_attempts: u32,
}

impl<'a, F: Firmware> Chainloader<'a, F> {
    pub fn new(fw: &'a F, config: RelayConfig) -> Self {
        Self {
            fw,
            config,
            stage: Stage::IdentifyBootDevice,
            disconnected: 0,
            volume_attempts: 0,
        }
    }

    /// Stage reached so far; on failure, the stage that failed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs every stage to completion or to the first fatal error.
    pub fn execute(&mut self) -> Result<Outcome<F::Handle>> {
        let mut step = Step::IdentifyBootDevice;
        self.stage = step.stage();
        debug!("State: {}", self.stage);

        loop {
            step = match self.step(step)? {
                StepResult::Continue(next) => next,
                StepResult::Finished(outcome) => {
                    self.stage = Stage::Done;
                    return Ok(outcome);
                }
                StepResult::Transition(next) => {
                    self.stage = next.stage();
                    debug!("State: {}", self.stage);
                    next
                }
            };
        }
    }

    /// Runs the chain loader and reports the exit status.
    ///
    /// On failure the error is shown and a key press awaited first, so the
    /// message is not wiped by whatever the firmware boots next.
    pub fn run(&mut self) -> Status {
        match self.execute() {
            Ok(_) => Status::SUCCESS,
            Err(err) => {
                let status = err.status();
                error!(
                    "{}: {} [{}: {}]",
                    self.stage,
                    err,
                    status.code(),
                    status
                );
                info!("Press any key to exit.");
                self.fw.wait_for_key();
                status
            }
        }
    }

    fn step(&mut self, step: Step<F>) -> Result<StepResult<F>> {
        let fw = self.fw;
        let next = match step {
            Step::IdentifyBootDevice => {
                let boot = match fw.image_device() {
                    Ok(device) => {
                        if let Ok(path) = fw.device_path(device) {
                            info!("Boot partition: {}", describe_path(fw, path));
                        }
                        Some(device)
                    }
                    Err(status) => {
                        warn!("Could not identify boot device: {}", status);
                        None
                    }
                };
                Step::RemediateBlockingDrivers { boot }
            }

            Step::RemediateBlockingDrivers { boot } => {
                self.disconnected = disconnect_blocking_drivers(fw);
                Step::LoadDriverImage { boot }
            }

            Step::LoadDriverImage { boot } => {
                let driver_path: EfiPath = self.config.driver_path.parse()?;
                let loaded = load_driver(fw, boot, &driver_path)?;
                if boot.is_some_and(|b| b != loaded.device) {
                    warn!("Driver found outside the boot partition, using its device instead");
                }
                Step::VerifyAndStartDriver {
                    boot: loaded.device,
                    driver: loaded.image,
                }
            }

            Step::VerifyAndStartDriver { boot, driver } => {
                verify_and_start(fw, driver)?;
                info!("NTFS driver started");
                Step::DiscoverTargetPartition { boot, driver }
            }

            Step::DiscoverTargetPartition { boot, driver } => {
                let partition = find_target_partition(fw, boot, self.config.same_device_only)?;
                Step::EnsureFileSystemService {
                    boot,
                    driver,
                    partition,
                }
            }

            Step::EnsureFileSystemService {
                boot,
                driver,
                partition,
            } => {
                let service = ensure_file_system(fw, partition, driver)?;
                Step::OpenVolume {
                    target: Target {
                        boot,
                        partition,
                        service,
                    },
                    attempt: 1,
                }
            }

            Step::OpenVolume { target, attempt } => match fw.open_volume(target.partition) {
                Ok(root) => {
                    self.volume_attempts = attempt;
                    Step::ResolveLoaderPathCase { target, root }
                }
                Err(status) if attempt <= self.config.volume_open_retries => {
                    warn!(
                        "Could not open NTFS volume: {}. Retrying in {} seconds...",
                        status,
                        self.config.retry_delay_us / 1_000_000
                    );
                    fw.stall(self.config.retry_delay_us);
                    return Ok(StepResult::Continue(Step::OpenVolume {
                        target,
                        attempt: attempt + 1,
                    }));
                }
                Err(status) => {
                    return Err(RelayError::Firmware {
                        op: "OpenVolume",
                        status,
                    })
                }
            },

            Step::ResolveLoaderPathCase { target, mut root } => {
                let mut path: EfiPath = self.config.loader_path.parse()?;
                resolve_path_case(&mut root, &mut path)?;
                Step::LoadFinalImage { target, path }
            }

            Step::LoadFinalImage { target, path } => {
                let dev_path = fw
                    .device_path(target.partition)
                    .map_err(RelayError::firmware("DevicePathFromHandle"))?;
                let image = fw
                    .load_image(&dev_path.with_file_path(path.as_units()))
                    .map_err(RelayError::firmware("LoadImage"))?;
                Step::StartFinalImage {
                    target,
                    path,
                    image,
                }
            }

            Step::StartFinalImage {
                target,
                path,
                image,
            } => {
                info!("Launching '{}'...", path);
                fw.start_image(image)
                    .map_err(RelayError::firmware("StartImage"))?;
                return Ok(StepResult::Finished(Outcome {
                    boot_device: target.boot,
                    partition: target.partition,
                    service: target.service,
                    loader_path: path,
                    disconnected: self.disconnected,
                    volume_attempts: self.volume_attempts,
                }));
            }
        };
        Ok(StepResult::Transition(next))
    }
}

// Control service: framed commands in, acknowledgements out
//
// One task owns the drive and the flash, so actuation state has a single writer.
// Datagrams are handled strictly in arrival order; each valid command except an
// acknowledgement is answered with the actuated speeds under the same message id.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::channel::UdpChannel;
use crate::camera::FlashLight;
use crate::motor::{Drive, DutySink, MotorSpeeds};
use crate::protocol::{self, Command, MAX_MESSAGE_LEN};

pub struct ControlService<S: DutySink, F: FlashLight> {
    channel: Arc<UdpChannel>,
    drive: Drive<S>,
    flash: F,
    last_receive: Option<Instant>,
    quiet: bool,
    backoff: Backoff,
}

impl<S: DutySink, F: FlashLight> ControlService<S, F> {
    pub fn new(channel: Arc<UdpChannel>, drive: Drive<S>, flash: F) -> Self {
        Self {
            channel,
            drive,
            flash,
            last_receive: None,
            quiet: true,
            backoff: Backoff::default(),
        }
    }

    /// Decode, apply and build the acknowledgement for one datagram.
    ///
    /// Returns `None` when nothing must be sent back: malformed datagrams and
    /// acknowledgements are never answered.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Option<Vec<u8>> {
        let message = match protocol::decode(datagram) {
            Ok(message) => message,
            Err(e) => {
                debug!("Dropping control datagram: {}", e);
                return None;
            }
        };

        let command = match message.command() {
            Ok(command) => command,
            Err(e) => {
                debug!("Dropping message {}: {}", message.id, e);
                return None;
            }
        };

        let speeds = self.dispatch(command)?;
        Some(protocol::ack(message.id, speeds))
    }

    /// Apply one command, returning the speeds to acknowledge
    pub fn dispatch(&mut self, command: Command) -> Option<MotorSpeeds> {
        let speeds = match command {
            Command::SpeedUp(magnitude) => self.drive.bump(magnitude as i32),
            Command::SpeedDown(magnitude) => self.drive.bump(-(magnitude as i32)),
            Command::TurnLeft(magnitude) => {
                self.drive.turn(-(magnitude as i32), magnitude as i32)
            }
            Command::TurnRight(magnitude) => {
                self.drive.turn(magnitude as i32, -(magnitude as i32))
            }
            Command::Set(target) => self.drive.set_absolute(target.left, target.right),
            Command::Stop => self.drive.stop(),
            Command::Deadzone(deadzone) => {
                self.drive.set_deadzone(deadzone);
                self.drive.actuated()
            }
            Command::Flash(duty) => {
                self.flash.set_duty(duty);
                self.drive.actuated()
            }
            Command::Ack(_) => return None,
            Command::Unknown(code) => {
                debug!("Ignoring unknown command 0x{:02X}", code);
                self.drive.actuated()
            }
        };

        Some(speeds)
    }

    pub fn drive(&self) -> &Drive<S> {
        &self.drive
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// When the last datagram arrived
    pub fn last_receive(&self) -> Option<Instant> {
        self.last_receive
    }

    pub async fn run(mut self) {
        info!(
            "Control service listening on UDP port {}",
            self.channel.local_port()
        );

        // One spare byte so a datagram longer than any valid message can never
        // be truncated into one that looks valid
        let mut buf = [0u8; MAX_MESSAGE_LEN + 1];

        loop {
            match self.channel.recv(&mut buf).await {
                Ok(Some((len, _))) => {
                    self.last_receive = Some(Instant::now());
                    self.quiet = false;
                    self.backoff.reset();

                    if let Some(ack) = self.handle_datagram(&buf[..len]) {
                        self.channel.send(&ack).await;
                    }
                }
                Ok(None) => {
                    if let (false, Some(at)) = (self.quiet, self.last_receive) {
                        info!("No control traffic for {:?}", at.elapsed());
                        self.quiet = true;
                    }
                }
                Err(e) => {
                    let delay = self.backoff.fail();
                    warn!("Control receive failed: {}, retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

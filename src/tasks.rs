//! Background task queue for transactional email.
//!
//! Handlers enqueue jobs and return immediately; a single worker task drains
//! the channel and talks to the mailer. Delivery failures are logged and
//! never surface to the HTTP response, so account endpoints stay
//! constant-shaped regardless of mail outcomes.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::email::Mailer;

/// A unit of background work.
#[derive(Debug)]
pub enum Job {
    /// Send an account activation link.
    ActivationEmail {
        email: String,
        uid: String,
        token: String,
    },
    /// Send a password reset link.
    PasswordResetEmail {
        email: String,
        uid: String,
        token: String,
    },
    /// Sent for reset requests against unknown addresses, so mail volume
    /// does not reveal which addresses have accounts.
    GenericResetNotice { email: String },
}

/// Handle for submitting jobs to the worker.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl TaskQueue {
    /// Spawn the worker task and return a submission handle.
    pub fn spawn(mailer: Arc<dyn Mailer>, frontend_origin: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                run_job(mailer.as_ref(), &frontend_origin, job).await;
            }
            debug!("Task worker shutting down");
        });
        Self { tx }
    }

    /// Enqueue a job. Failures mean the worker is gone; log and drop.
    pub fn submit(&self, job: Job) {
        if self.tx.send(job).is_err() {
            error!("Task worker unavailable, dropping job");
        }
    }
}

async fn run_job(mailer: &dyn Mailer, frontend_origin: &str, job: Job) {
    let (to, subject, body) = match job {
        Job::ActivationEmail { email, uid, token } => {
            let link = format!(
                "{}/pages/auth/activate.html?uid={}&token={}",
                frontend_origin, uid, token
            );
            (
                email,
                "Activate Your Account",
                format!(
                    "Welcome to Videoflix!\n\n\
                     Please confirm your email address to activate your account:\n\n{}\n\n\
                     The link is valid for 3 days.",
                    link
                ),
            )
        }
        Job::PasswordResetEmail { email, uid, token } => {
            let link = format!(
                "{}/pages/auth/confirm_password.html?uid={}&token={}",
                frontend_origin, uid, token
            );
            (
                email,
                "Reset Your Password",
                format!(
                    "We received a request to reset your password.\n\n\
                     Click the link below to choose a new one:\n\n{}\n\n\
                     If you did not request this, you can ignore this email.",
                    link
                ),
            )
        }
        Job::GenericResetNotice { email } => (
            email,
            "Reset Your Password",
            "If an account exists for this address, a reset link has been sent.".to_string(),
        ),
    };

    if let Err(e) = mailer.send(&to, subject, &body).await {
        error!(to, subject, "Failed to send email: {}", e);
    }
}

use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::http::Method;
use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;

use crate::configuration::Settings;
use crate::mailer::Mailer;
use crate::routes::{contact, contact_preflight, health_check};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let mailer = configuration.mailer.build_mailer()?;
        Self::build_with_mailer(configuration, mailer)
    }

    pub fn build_with_mailer(
        configuration: Settings,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(configuration.application.address())?;
        let port = listener.local_addr()?.port();
        let server = run(listener, mailer)?;
        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(tcp_listener: TcpListener, mailer: Arc<dyn Mailer>) -> Result<Server, std::io::Error> {
    let mailer: web::Data<dyn Mailer> = web::Data::from(mailer);

    let address = tcp_listener.local_addr()?;
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::resource("/api/contact")
                    .route(web::post().to(contact))
                    .route(web::method(Method::OPTIONS).to(contact_preflight)),
            )
            .app_data(mailer.clone())
    })
    .listen(tcp_listener)?
    .run();
    tracing::info!(%address, "Listening");
    Ok(server)
}

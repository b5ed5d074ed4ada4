//! Request handler definitions
//!
//! Define each route and its handler here. Handlers only validate the request and hand it to the
//! [`PaymentRelayApi`]. Nothing in here talks to a payment processor: `POST /payments` answers as soon as the payment
//! is queued.
//!
//! Any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) must be expressed as futures, since each
//! actix worker thread processes its requests sequentially and a blocking handler stalls every request behind it.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use payment_relay_engine::{PaymentRelayApi, TaskQueue, TransactionLedger};

use crate::{
    data_objects::{PaymentSubmission, SummaryParams},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Requests with a method other than the route's get a 405.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .route(actix_web::Route::new().guard(actix_web::guard::$method()).to($name::< $( [< T $bounds:camel >], )+>))
                    .default_service(actix_web::web::to($crate::routes::method_not_allowed));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

pub async fn method_not_allowed(req: HttpRequest) -> Result<HttpResponse, ServerError> {
    debug!("💻️ {} is not supported on {}", req.method(), req.path());
    Err(ServerError::MethodNotAllowed)
}

/// Malformed JSON bodies get the same `{"error": ...}` treatment as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("💻️ Rejecting request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| ServerError::InvalidQuery(err.to_string()).into())
}

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

route!(payments => Post "/payments" impl TransactionLedger, TaskQueue);
/// Accepts a payment and queues it for delivery. Responds with an empty 200 once the payment is queued; the outcome of
/// the delivery itself is only visible through the summary.
pub async fn payments<L: TransactionLedger, Q: TaskQueue>(
    body: web::Json<PaymentSubmission>,
    api: web::Data<PaymentRelayApi<L, Q>>,
) -> Result<HttpResponse, ServerError> {
    let submission = body.into_inner();
    trace!("💻️ POST payment {} for {}", submission.correlation_id, submission.amount);
    submission.validate()?;
    api.submit_payment(submission.correlation_id, submission.amount).await.map_err(|e| {
        error!("💻️ Could not queue a payment. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().finish())
}

route!(payments_summary => Get "/payments-summary" impl TransactionLedger, TaskQueue);
pub async fn payments_summary<L: TransactionLedger, Q: TaskQueue>(
    query: web::Query<SummaryParams>,
    api: web::Data<PaymentRelayApi<L, Q>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET payments summary for [{query}]");
    let window = query.window()?;
    let summary = api.payments_summary(window).await.map_err(|e| {
        error!("💻️ Could not summarize payments. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(summary))
}

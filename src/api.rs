// src/api.rs
use crate::auth::{self, Sessions, SESSION_COOKIE};
use crate::error::AppError;
use crate::forms::{
    DepositRequest, LoginRequest, RawDepositForm, RawLoginForm, RawQuoteForm, RawRegisterForm,
    RawTradeForm, RegisterRequest, TradeRequest,
};
use crate::ledger::Ledger;
use crate::models::CurrentUser;
use crate::views;
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::header::{HeaderMap, HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA, SET_COOKIE};
use warp::http::{StatusCode, Uri};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const FORM_LIMIT: u64 = 16 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub sessions: Arc<Sessions>,
}

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let sessions = state.sessions.clone();

    let index = warp::path::end()
        .and(warp::get().or(warp::post()).unify())
        .and(with_user(sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(index_handler);

    let buy_page = warp::path!("buy")
        .and(warp::get())
        .and(with_user(sessions.clone()))
        .and_then(|_user: CurrentUser| async move { Ok::<_, Rejection>(html(views::buy_form())) });

    let buy = warp::path!("buy")
        .and(warp::post())
        .and(with_user(sessions.clone()))
        .and(with_state(state.clone()))
        .and(form::<RawTradeForm>())
        .and_then(buy_handler);

    let sell_page = warp::path!("sell")
        .and(warp::get())
        .and(with_user(sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(sell_page_handler);

    let sell = warp::path!("sell")
        .and(warp::post())
        .and(with_user(sessions.clone()))
        .and(with_state(state.clone()))
        .and(form::<RawTradeForm>())
        .and_then(sell_handler);

    let history = warp::path!("history")
        .and(warp::get())
        .and(with_user(sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(history_handler);

    let quote_page = warp::path!("quote")
        .and(warp::get())
        .and(with_user(sessions.clone()))
        .and_then(|_user: CurrentUser| async move { Ok::<_, Rejection>(html(views::quote_form())) });

    let quote = warp::path!("quote")
        .and(warp::post())
        .and(with_user(sessions.clone()))
        .and(with_state(state.clone()))
        .and(form::<RawQuoteForm>())
        .and_then(quote_handler);

    let cash_page = warp::path!("cash")
        .and(warp::get())
        .and(with_user(sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(cash_page_handler);

    let cash = warp::path!("cash")
        .and(warp::post())
        .and(with_user(sessions.clone()))
        .and(with_state(state.clone()))
        .and(form::<RawDepositForm>())
        .and_then(cash_handler);

    let login_page = warp::path!("login")
        .and(warp::get())
        .map(|| with_cookie(html(views::login_form()), &auth::clear_session_cookie()));

    let login = warp::path!("login")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(form::<RawLoginForm>())
        .and_then(login_handler);

    let logout = warp::path!("logout")
        .and(warp::get())
        .map(|| with_cookie(redirect("/"), &auth::clear_session_cookie()));

    let register_page = warp::path!("register")
        .and(warp::get())
        .map(|| html(views::register_form()));

    let register = warp::path!("register")
        .and(warp::post())
        .and(with_state(state))
        .and(form::<RawRegisterForm>())
        .and_then(register_handler);

    index
        .or(buy_page)
        .unify()
        .or(buy)
        .unify()
        .or(sell_page)
        .unify()
        .or(sell)
        .unify()
        .or(history)
        .unify()
        .or(quote_page)
        .unify()
        .or(quote)
        .unify()
        .or(cash_page)
        .unify()
        .or(cash)
        .unify()
        .or(login_page)
        .unify()
        .or(login)
        .unify()
        .or(logout)
        .unify()
        .or(register_page)
        .unify()
        .or(register)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::reply::with::headers(no_cache_headers()))
        .with(warp::log("finance"))
}

fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Resolves the session cookie into the request's user, or rejects with
/// `Unauthenticated` (rendered as a redirect to the login page).
fn with_user(
    sessions: Arc<Sessions>,
) -> impl Filter<Extract = (CurrentUser,), Error = Rejection> + Clone {
    warp::cookie::optional(SESSION_COOKIE).and_then(move |token: Option<String>| {
        let sessions = sessions.clone();
        async move {
            match token {
                Some(token) => sessions.verify(&token).map_err(warp::reject::custom),
                None => Err(warp::reject::custom(AppError::Unauthenticated)),
            }
        }
    })
}

fn form<T: DeserializeOwned + Send + 'static>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

fn html(body: String) -> Response {
    warp::reply::html(body).into_response()
}

fn redirect(path: &'static str) -> Response {
    warp::redirect::see_other(Uri::from_static(path)).into_response()
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!("Refusing to send malformed cookie: {}", e),
    }
    response
}

fn reject(e: AppError) -> Rejection {
    warp::reject::custom(e)
}

fn apology(message: &str, status: StatusCode) -> Response {
    warp::reply::with_status(html(views::apology(message, status.as_u16())), status)
        .into_response()
}

fn apology_for(e: &AppError) -> Response {
    match e {
        AppError::Unauthenticated => return redirect("/login"),
        AppError::Upstream(_) | AppError::Storage(_) | AppError::Internal(_) => {
            error!("Request failed: {}", e)
        }
        AppError::Domain(_) => warn!("Request refused: {}", e),
        AppError::Validation(_) | AppError::Auth(_) => info!("Request rejected: {}", e),
    }
    apology(&e.public_message(), e.status())
}

/// Renders every rejection as an apology page.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<AppError>() {
        return Ok(apology_for(e));
    }

    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Form Too Large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Length Required")
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Malformed Form")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };
    Ok(apology(message, status))
}

async fn index_handler(user: CurrentUser, state: AppState) -> Result<Response, Rejection> {
    let portfolio = state.ledger.portfolio(user).await.map_err(reject)?;
    Ok(html(views::portfolio(&portfolio)))
}

async fn buy_handler(
    user: CurrentUser,
    state: AppState,
    form: RawTradeForm,
) -> Result<Response, Rejection> {
    let request = TradeRequest::try_from(form).map_err(reject)?;
    state
        .ledger
        .buy(user, &request.symbol, request.shares)
        .await
        .map_err(reject)?;
    Ok(redirect("/"))
}

async fn sell_page_handler(user: CurrentUser, state: AppState) -> Result<Response, Rejection> {
    let symbols = state.ledger.held_symbols(user).await.map_err(reject)?;
    Ok(html(views::sell_form(&symbols)))
}

async fn sell_handler(
    user: CurrentUser,
    state: AppState,
    form: RawTradeForm,
) -> Result<Response, Rejection> {
    let request = TradeRequest::try_from(form).map_err(reject)?;
    state
        .ledger
        .sell(user, &request.symbol, request.shares)
        .await
        .map_err(reject)?;
    Ok(redirect("/"))
}

async fn history_handler(user: CurrentUser, state: AppState) -> Result<Response, Rejection> {
    let trades = state.ledger.history(user).await.map_err(reject)?;
    Ok(html(views::history(&trades)))
}

async fn quote_handler(
    _user: CurrentUser,
    state: AppState,
    form: RawQuoteForm,
) -> Result<Response, Rejection> {
    let symbol = form.symbol().map_err(reject)?;
    let quote = state.ledger.quote(&symbol).await.map_err(reject)?;
    Ok(html(views::quoted(&quote)))
}

async fn cash_page_handler(user: CurrentUser, state: AppState) -> Result<Response, Rejection> {
    let balance = state.ledger.cash(user).await.map_err(reject)?;
    Ok(html(views::cash_form(balance)))
}

async fn cash_handler(
    user: CurrentUser,
    state: AppState,
    form: RawDepositForm,
) -> Result<Response, Rejection> {
    let request = DepositRequest::try_from(form).map_err(reject)?;
    state
        .ledger
        .deposit(user, request.amount)
        .await
        .map_err(reject)?;
    Ok(redirect("/"))
}

async fn authenticate(state: &AppState, form: RawLoginForm) -> Result<String, AppError> {
    let request = LoginRequest::try_from(form)?;
    let user_id = auth::login(state.ledger.db(), request).await?;
    state.sessions.create_token(user_id)
}

/// Any previous session is dropped whether or not the login succeeds.
async fn login_handler(state: AppState, form: RawLoginForm) -> Result<Response, Rejection> {
    Ok(match authenticate(&state, form).await {
        Ok(token) => with_cookie(redirect("/"), &auth::session_cookie(&token)),
        Err(e) => with_cookie(apology_for(&e), &auth::clear_session_cookie()),
    })
}

async fn register_handler(state: AppState, form: RawRegisterForm) -> Result<Response, Rejection> {
    let request = RegisterRequest::try_from(form).map_err(reject)?;
    let user_id = auth::register(state.ledger.db(), request)
        .await
        .map_err(reject)?;
    let token = state.sessions.create_token(user_id).map_err(reject)?;
    Ok(with_cookie(redirect("/"), &auth::session_cookie(&token)))
}

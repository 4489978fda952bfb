//! Route table and middleware wiring.
use std::sync::Arc;

use crate::auth::{auth_required, session_middleware};
use crate::handlers::{
    admins, auth, catalog, certificate, community, leads, students, uploads, verify,
};
use crate::route;
use crate::router::{PostMiddleware, Router, status_text};
use crate::state::AppState;

pub const API_PREFIX: &str = "/api/v1";

fn api(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

/// Logs method, path, status and handling time of every request.
pub fn request_timing() -> PostMiddleware {
    Arc::new(|ctx, resp| {
        let elapsed = ctx
            .start_time
            .map(|t| t.elapsed().as_millis())
            .unwrap_or_default();
        log::info!(
            "{:?} {} -> {} {} ({} ms)",
            ctx.method,
            ctx.path,
            resp.status_code,
            status_text(resp.status_code),
            elapsed
        );
        resp
    })
}

/// Every endpoint of the service.
pub fn build_router(state: &AppState) -> Router {
    let mut router = Router::new();
    router.add_middleware(session_middleware(state.tokens.clone()));
    router.add_post_middleware(request_timing());

    let session = auth_required();

    route!(router,
        // sessions and accounts
        POST &api("/login") => { auth::login },
        POST &api("/logout") => { auth::logout },
        GET &api("/get-user-details") => { auth::user_details, session },
        POST &api("/register") => { auth::register },
        POST &api("/verifyOtp") => { auth::verify_otp },
        POST &api("/resend-otp") => { auth::resend_otp },
        POST &api("/forgetPassword") => { auth::forget_password },
        POST &api("/resetPassword/:token") => { auth::reset_password },

        // branch admins
        POST &api("/branchadmin") => { admins::create, session },
        GET &api("/get-all-branch-admins") => { admins::list, session },
        PUT &api("/update-branch-admin/:id") => { admins::update, session },
        DELETE &api("/delete-branch-admin/:id") => { admins::delete, session },

        // students
        POST &api("/register-user") => { students::create, session },
        GET &api("/get-all-users") => { students::list, session },
        POST &api("/get-user-by-id") => { students::get_by_user_id, session },
        PUT &api("/update-user/:id") => { students::update, session },
        PUT &api("/update-certificate-status/:id") => { students::certificate_status, session },
        DELETE &api("/delete-user/:id") => { students::delete, session },

        // certificates and verification
        POST &api("/certificate") => { certificate::bundle, session },
        GET &api("/certificate-preview/:kind/:userId") => { certificate::preview, session },
        GET &api("/verify-user/:userId") => { verify::verify_json },
        GET "/verify/:userId" => { verify::verify_page },

        // branches and courses
        POST &api("/addBranch") => { catalog::add_branch, session },
        GET &api("/getBranches") => { catalog::list_branches },
        DELETE &api("/deleteBranch/:id") => { catalog::delete_branch, session },
        POST &api("/addCourse") => { catalog::add_course, session },
        GET &api("/getCourse") => { catalog::list_courses },
        DELETE &api("/deleteCourse/:id") => { catalog::delete_course, session },

        // team, activities, gallery
        POST &api("/create-team") => { community::create_team_member, session },
        GET &api("/get-team-member") => { community::list_team },
        POST &api("/create-activity") => { community::create_activity, session },
        GET &api("/get-activity") => { community::list_activities },
        POST &api("/upload-image") => { community::upload_images, session },
        GET &api("/recent") => { community::recent_images },

        // leads and notifications
        POST &api("/applyCourse") => { leads::apply },
        POST &api("/apply-in-a-course") => { leads::inquire },
        POST &api("/send-msg") => { leads::send_message },
        GET &api("/get-notification") => { leads::notifications, session },
        DELETE &api("/delete-notification/:id/:type") => { leads::delete_notification, session },

        GET "/uploads/:file" => { uploads::serve },
    );

    log::debug!("Registered {} routes", router.routes.len());
    router
}

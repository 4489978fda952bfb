mod common;

use certdesk::models::admin::AdminRole;
use certdesk::router::{FormData, Method, Request};
use std::sync::Arc;

use common::{FailingMailer, PASSWORD, api, encode_id, image, student_form, test_app};
use serde_json::json;

#[tokio::test]
async fn test_register_student_and_look_it_up() {
    let app = test_app().await;
    let token = app.super_admin().await;

    // 1. Register; the first student in a branch gets sequence 001
    let user_id = app
        .register_student(&token, "9876543210", ("Barasat", "B01"))
        .await;
    assert_eq!(user_id, "RYIT/WB-B01/001");

    // 2. Admin lookup by registration number
    let resp = app
        .send(
            api(Method::POST, "/get-user-by-id")
                .with_cookie("token", &token)
                .with_json(&json!({ "userId": user_id })),
        )
        .await;
    assert_eq!(resp.status_code, 200);
    let body = resp.json_body().unwrap();
    assert_eq!(body["data"]["name"], "Asha Roy");
    assert_eq!(body["data"]["branchName"], "Barasat");
    assert!(body["data"].get("passwordHash").is_none());

    // 3. Public verification with the identifier percent-encoded
    let resp = app
        .send(api(
            Method::GET,
            &format!("/verify-user/{}", encode_id(&user_id)),
        ))
        .await;
    assert_eq!(resp.status_code, 200);
    let body = resp.json_body().unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["userId"], "RYIT/WB-B01/001");
    assert!(
        body["data"]["image"]
            .as_str()
            .unwrap()
            .starts_with("http://localhost:3000/uploads/students-")
    );
}

#[tokio::test]
async fn test_sequences_are_per_branch() {
    let app = test_app().await;
    let token = app.super_admin().await;

    let first = app.register_student(&token, "9000000001", ("Barasat", "B01")).await;
    let second = app.register_student(&token, "9000000002", ("Barasat", "B01")).await;
    let other = app.register_student(&token, "9000000003", ("Habra", "H02")).await;

    assert_eq!(first, "RYIT/WB-B01/001");
    assert_eq!(second, "RYIT/WB-B01/002");
    assert_eq!(other, "RYIT/WB-H02/001");
}

#[tokio::test]
async fn test_unknown_registration_number_is_not_found() {
    let app = test_app().await;
    let token = app.super_admin().await;

    let resp = app
        .send(api(Method::GET, "/verify-user/RYIT%2FWB-B01%2F999"))
        .await;
    assert_eq!(resp.status_code, 404);
    assert_eq!(resp.json_body().unwrap()["message"], "User not found.");

    let resp = app
        .send(
            api(Method::POST, "/get-user-by-id")
                .with_cookie("token", &token)
                .with_json(&json!({ "userId": "RYIT/WB-B01/999" })),
        )
        .await;
    assert_eq!(resp.status_code, 404);

    let resp = app
        .send(
            api(Method::POST, "/get-user-by-id")
                .with_cookie("token", &token)
                .with_json(&json!({})),
        )
        .await;
    assert_eq!(resp.status_code, 400);
}

#[tokio::test]
async fn test_duplicate_mobile_is_rejected_before_validation() {
    let app = test_app().await;
    let token = app.super_admin().await;
    app.register_student(&token, "9876543210", ("Barasat", "B01")).await;

    // Only the mobile is sent: the duplicate wins over missing fields
    let mut form = FormData::default();
    form.fields
        .insert("mobile".to_string(), "9876543210".to_string());
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &token)
                .with_form(form),
        )
        .await;
    assert_eq!(resp.status_code, 400);
    assert_eq!(
        resp.json_body().unwrap()["message"],
        "User with this Phone number already exists"
    );
}

#[tokio::test]
async fn test_registration_validation() {
    let app = test_app().await;
    let token = app.super_admin().await;

    // 1. Missing fields are named
    let mut form = student_form("9111111111", "Barasat", "B01");
    form.fields.remove("fathername");
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &token)
                .with_form(form),
        )
        .await;
    assert_eq!(resp.status_code, 400);
    assert!(
        resp.json_body().unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("fathername")
    );

    // 2. No image
    let mut form = student_form("9111111111", "Barasat", "B01");
    form.files.clear();
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &token)
                .with_form(form),
        )
        .await;
    assert_eq!(resp.status_code, 400);

    // 3. Mobile belonging to an admin
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &token)
                .with_form(student_form("9000000000", "Barasat", "B01")),
        )
        .await;
    assert_eq!(resp.status_code, 400);
    assert_eq!(
        resp.json_body().unwrap()["message"],
        "Mobile is already registered as an Admin"
    );
}

#[tokio::test]
async fn test_admin_routes_require_a_session() {
    let app = test_app().await;

    let resp = app.send(api(Method::GET, "/get-all-users")).await;
    assert_eq!(resp.status_code, 401);

    let resp = app
        .send(api(Method::GET, "/get-all-users").with_cookie("token", "not-a-jwt"))
        .await;
    assert_eq!(resp.status_code, 401);

    // public routes stay open
    let resp = app.send(api(Method::GET, "/getBranches")).await;
    assert_eq!(resp.status_code, 200);
}

#[tokio::test]
async fn test_branch_admin_is_confined_to_their_branch() {
    let app = test_app().await;
    let root = app.super_admin().await;
    let north = app
        .admin("9200000000", AdminRole::BranchAdmin, Some(("North", "N01")))
        .await;

    let south_id = app.register_student(&root, "9300000001", ("South", "S01")).await;
    let north_id = app.register_student(&north, "9300000002", ("North", "N01")).await;
    assert_eq!(north_id, "RYIT/WB-N01/001");

    // 1. Cannot register into another branch
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &north)
                .with_form(student_form("9300000003", "South", "S01")),
        )
        .await;
    assert_eq!(resp.status_code, 403);

    // 2. Listing only shows their own branch
    let resp = app
        .send(api(Method::GET, "/get-all-users").with_cookie("token", &north))
        .await;
    let body = resp.json_body().unwrap();
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["userId"], "RYIT/WB-N01/001");

    // 3. Lookup, update, delete and certificates of the other branch are refused
    let resp = app
        .send(
            api(Method::POST, "/get-user-by-id")
                .with_cookie("token", &north)
                .with_json(&json!({ "userId": south_id })),
        )
        .await;
    assert_eq!(resp.status_code, 403);

    let south = certdesk::models::student::Student::find_by_user_id(&app.state.db, &south_id)
        .await
        .unwrap()
        .unwrap();
    let resp = app
        .send(
            api(Method::PUT, &format!("/update-user/{}", south.id))
                .with_cookie("token", &north)
                .with_json(&json!({ "name": "Changed" })),
        )
        .await;
    assert_eq!(resp.status_code, 403);

    let resp = app
        .send(
            api(Method::DELETE, &format!("/delete-user/{}", south.id))
                .with_cookie("token", &north),
        )
        .await;
    assert_eq!(resp.status_code, 403);
    assert_eq!(
        resp.json_body().unwrap()["message"],
        "Cannot delete users from other branches."
    );

    let resp = app
        .send(
            api(Method::POST, "/certificate")
                .with_cookie("token", &north)
                .with_json(&json!({ "userId": south_id })),
        )
        .await;
    assert_eq!(resp.status_code, 403);

    // 4. Super-only routes
    let resp = app
        .send(api(Method::GET, "/get-all-branch-admins").with_cookie("token", &north))
        .await;
    assert_eq!(resp.status_code, 403);
}

#[tokio::test]
async fn test_update_recomputes_grades() {
    let app = test_app().await;
    let token = app.super_admin().await;
    let user_id = app.register_student(&token, "9400000000", ("Barasat", "B01")).await;
    let student = certdesk::models::student::Student::find_by_user_id(&app.state.db, &user_id)
        .await
        .unwrap()
        .unwrap();
    let path = format!("/update-user/{}", student.id);

    // 1. Numbers and strings are both accepted
    let resp = app
        .send(
            api(Method::PUT, &path)
                .with_cookie("token", &token)
                .with_json(&json!({ "theory": 45, "practical": "40", "typingWPM": 35 })),
        )
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let data = &resp.json_body().unwrap()["data"];
    assert_eq!(data["totalmarks"], 85);
    assert_eq!(data["grade"], "A");
    assert_eq!(data["typingWPM"], 35);
    assert_eq!(data["typingGrade"], "Fail");

    // 2. Stored marks are reused when only typing marks change
    let resp = app
        .send(
            api(Method::PUT, &path)
                .with_cookie("token", &token)
                .with_json(&json!({ "typingMarks": 72 })),
        )
        .await;
    let data = &resp.json_body().unwrap()["data"];
    assert_eq!(data["theory"], 45);
    assert_eq!(data["totalmarks"], 85);
    assert_eq!(data["typingGrade"], "B+");

    // 3. Non-numeric marks are rejected
    let resp = app
        .send(
            api(Method::PUT, &path)
                .with_cookie("token", &token)
                .with_json(&json!({ "theory": "forty" })),
        )
        .await;
    assert_eq!(resp.status_code, 400);

    // 3b. Marks above full marks are rejected instead of overflowing the total
    let resp = app
        .send(
            api(Method::PUT, &path)
                .with_cookie("token", &token)
                .with_json(&json!({ "theory": "9223372036854775807", "practical": "1" })),
        )
        .await;
    assert_eq!(resp.status_code, 400);
    assert!(
        resp.json_body().unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("between 0 and 100")
    );

    // 4. Verification reflects the update and is repeatable
    let verify = api(Method::GET, &format!("/verify-user/{}", encode_id(&user_id)));
    let first = app.send(verify.clone()).await;
    let second = app.send(verify).await;
    assert_eq!(first.body, second.body);
    assert_eq!(first.json_body().unwrap()["data"]["grade"], "A");
}

#[tokio::test]
async fn test_registration_takes_the_code_of_the_stored_branch() {
    let app = test_app().await;
    let barasat = app
        .admin("9210000000", AdminRole::BranchAdmin, Some(("Barasat", "B01")))
        .await;
    app.branch("Barasat", "B01").await;
    app.branch("Habra", "H02").await;

    // 1. Another branch's code is refused
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &barasat)
                .with_form(student_form("9310000001", "Barasat", "H02")),
        )
        .await;
    assert_eq!(resp.status_code, 400);

    // 2. Unknown branch
    let root = app.super_admin().await;
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &root)
                .with_form(student_form("9310000002", "Nowhere", "X99")),
        )
        .await;
    assert_eq!(resp.status_code, 404);

    // 3. The matching code numbers within the branch
    let user_id = app.register_student(&barasat, "9310000003", ("Barasat", "B01")).await;
    assert_eq!(user_id, "RYIT/WB-B01/001");
}

#[tokio::test]
async fn test_super_admin_moves_student_to_another_branch() {
    let app = test_app().await;
    let token = app.super_admin().await;
    let user_id = app.register_student(&token, "9500000000", ("Barasat", "B01")).await;
    let student = certdesk::models::student::Student::find_by_user_id(&app.state.db, &user_id)
        .await
        .unwrap()
        .unwrap();
    let path = format!("/update-user/{}", student.id);

    // 1. Unknown branch
    let resp = app
        .send(
            api(Method::PUT, &path)
                .with_cookie("token", &token)
                .with_json(&json!({ "branchName": "Nowhere" })),
        )
        .await;
    assert_eq!(resp.status_code, 404);

    // 2. Create the branch, then move
    let mut branch = FormData::default();
    branch.fields.insert("branchName".into(), "Habra".into());
    branch.fields.insert("branchCode".into(), "H02".into());
    let resp = app
        .send(
            api(Method::POST, "/addBranch")
                .with_cookie("token", &token)
                .with_form(branch),
        )
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());

    let resp = app
        .send(
            api(Method::PUT, &path)
                .with_cookie("token", &token)
                .with_json(&json!({ "branchName": "Habra" })),
        )
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let data = &resp.json_body().unwrap()["data"];
    assert_eq!(data["userId"], "RYIT/WB-H02/001");
    assert_eq!(data["branchCode"], "H02");
}

#[tokio::test]
async fn test_certificate_status_and_delete() {
    let app = test_app().await;
    let token = app.super_admin().await;
    let user_id = app.register_student(&token, "9600000000", ("Barasat", "B01")).await;
    let student = certdesk::models::student::Student::find_by_user_id(&app.state.db, &user_id)
        .await
        .unwrap()
        .unwrap();

    let resp = app
        .send(
            api(Method::PUT, &format!("/update-certificate-status/{}", student.id))
                .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.json_body().unwrap()["data"]["certificateDownloaded"], true);

    let resp = app
        .send(
            api(Method::DELETE, &format!("/delete-user/{}", student.id))
                .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 200);

    let resp = app
        .send(
            api(Method::DELETE, &format!("/delete-user/{}", student.id))
                .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 404);
}

#[tokio::test]
async fn test_certificate_bundle_pdf() {
    let app = test_app().await;
    let token = app.super_admin().await;
    let user_id = app.register_student(&token, "9700000000", ("Barasat", "B01")).await;

    // Backgrounds are missing in the test assets dir: pages render blank
    let resp = app
        .send(
            api(Method::POST, "/certificate")
                .with_cookie("token", &token)
                .with_json(&json!({ "userId": user_id })),
        )
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.headers["Content-Type"], "application/pdf");
    assert_eq!(
        resp.headers["Content-Disposition"],
        "attachment; filename=\"RYIT_WB-B01_001_All_Certificates.pdf\""
    );
    assert!(resp.body.starts_with(b"%PDF-1.4"));
    let pdf = lopdf::Document::load_mem(&resp.body).unwrap();
    let pages = pdf.get_pages();
    assert_eq!(pages.len(), 3);
    let first = pdf.get_page_content(pages[&1]).unwrap();
    assert!(String::from_utf8_lossy(&first).contains("(Asha Roy)"));

    // SVG preview of a single overlay
    let resp = app
        .send(
            api(
                Method::GET,
                &format!("/certificate-preview/marksheet/{}", encode_id(&user_id)),
            )
            .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.headers["Content-Type"], "image/svg+xml");
    assert!(resp.text().contains("<svg"));

    let resp = app
        .send(
            api(
                Method::GET,
                &format!("/certificate-preview/diploma/{}", encode_id(&user_id)),
            )
            .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 400);
}

#[tokio::test]
async fn test_verification_page() {
    let app = test_app().await;
    let token = app.super_admin().await;
    let user_id = app.register_student(&token, "9800000000", ("Barasat", "B01")).await;

    let resp = app
        .send(Request::new(
            Method::GET,
            &format!("/verify/{}", encode_id(&user_id)),
        ))
        .await;
    assert_eq!(resp.status_code, 200);
    let html = resp.text();
    assert!(html.contains("Asha Roy"));
    assert!(html.contains("RYIT/WB-B01/001"));

    let resp = app
        .send(Request::new(Method::GET, "/verify/RYIT%2FWB-B01%2F404"))
        .await;
    assert_eq!(resp.status_code, 404);
    assert!(resp.text().contains("RYIT/WB-B01/404"));
}

#[tokio::test]
async fn test_script_bearing_svg_upload_is_rejected() {
    let app = test_app().await;
    let token = app.super_admin().await;
    app.branch("Barasat", "B01").await;

    let mut form = student_form("9820000001", "Barasat", "B01");
    form.files[0].file_name = "x.svg".to_string();
    form.files[0].content_type = "image/svg+xml".to_string();
    form.files[0].bytes =
        b"<svg xmlns=\"http://www.w3.org/2000/svg\"><script>alert(1)</script></svg>".to_vec();
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &token)
                .with_form(form),
        )
        .await;
    assert_eq!(resp.status_code, 400);
    assert!(
        resp.json_body().unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("x.svg")
    );

    // a PNG sent under an SVG name is stored and served as PNG
    let mut form = student_form("9820000002", "Barasat", "B01");
    form.files[0].file_name = "x.svg".to_string();
    let resp = app
        .send(
            api(Method::POST, "/register-user")
                .with_cookie("token", &token)
                .with_form(form),
        )
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let user_id = resp.json_body().unwrap()["data"]["userId"]
        .as_str()
        .unwrap()
        .to_string();
    let student = certdesk::models::student::Student::find_by_user_id(&app.state.db, &user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(student.image.ends_with(".png"));
}

#[tokio::test]
async fn test_uploaded_images_are_served() {
    let app = test_app().await;
    let token = app.super_admin().await;
    let user_id = app.register_student(&token, "9810000000", ("Barasat", "B01")).await;
    let student = certdesk::models::student::Student::find_by_user_id(&app.state.db, &user_id)
        .await
        .unwrap()
        .unwrap();

    let path = student.image.trim_start_matches("http://localhost:3000");
    let resp = app.send(Request::new(Method::GET, path)).await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.headers["Content-Type"], "image/png");
    assert_eq!(resp.headers["X-Content-Type-Options"], "nosniff");
    assert_eq!(resp.body, image("photo.png").bytes);

    let resp = app
        .send(Request::new(Method::GET, "/uploads/..%2Fsecret"))
        .await;
    assert_eq!(resp.status_code, 404);
}

#[tokio::test]
async fn test_registration_survives_a_failed_otp_mail() {
    let app = test_app().await;
    let recording = app.mailer.clone();
    let app = app.with_mailer(Arc::new(FailingMailer));
    let email = "owner@example.com";

    let resp = app
        .send(api(Method::POST, "/register").with_json(&json!({
            "name": "Owner",
            "email": email,
            "mobile": "9999999999",
            "password": PASSWORD,
        })))
        .await;
    assert_eq!(resp.status_code, 500);
    let body = resp.json_body().unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("/resend-otp"));

    // the account exists and can still be verified with a new code
    let app = app.with_mailer(recording);
    let resp = app
        .send(api(Method::POST, "/resend-otp").with_json(&json!({ "email": email })))
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    assert!(app.mailer.last_to(email).is_some());
}

#[tokio::test]
async fn test_super_admin_registration_and_login() {
    let app = test_app().await;
    let email = "owner@example.com";

    // 1. Register; an OTP is mailed
    let resp = app
        .send(api(Method::POST, "/register").with_json(&json!({
            "name": "Owner",
            "email": email,
            "mobile": "9999999999",
            "password": PASSWORD,
        })))
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let mail = app.mailer.last_to(email).unwrap();
    let otp: String = mail
        .text
        .split("code is: ")
        .nth(1)
        .unwrap()
        .chars()
        .take(6)
        .collect();
    assert_eq!(otp.len(), 6);

    // 2. A second super admin is refused
    let resp = app
        .send(api(Method::POST, "/register").with_json(&json!({
            "name": "Other",
            "email": "other@example.com",
            "mobile": "9999999998",
            "password": PASSWORD,
        })))
        .await;
    assert_eq!(resp.status_code, 403);

    // 3. Login before verification
    let login = api(Method::POST, "/login")
        .with_json(&json!({ "mobile": "9999999999", "password": PASSWORD }));
    let resp = app.send(login.clone()).await;
    assert_eq!(resp.status_code, 403);

    // 4. Wrong OTP, then the right one, then again
    let resp = app
        .send(api(Method::POST, "/verifyOtp").with_json(&json!({ "email": email, "otp": "000000x" })))
        .await;
    assert_eq!(resp.status_code, 400);
    let resp = app
        .send(api(Method::POST, "/verifyOtp").with_json(&json!({ "email": email, "otp": otp })))
        .await;
    assert_eq!(resp.status_code, 200);
    let resp = app
        .send(api(Method::POST, "/verifyOtp").with_json(&json!({ "email": email, "otp": otp })))
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.json_body().unwrap()["message"], "Account is already verified");

    // 5. Login sets the session cookie
    let resp = app.send(login).await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.json_body().unwrap()["role"], "super");
    let cookie = resp.headers["Set-Cookie"].clone();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    let token = cookie
        .trim_start_matches("token=")
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let resp = app
        .send(api(Method::GET, "/get-user-details").with_cookie("token", &token))
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.json_body().unwrap()["data"]["email"], email);

    // 6. Wrong password
    let resp = app
        .send(api(Method::POST, "/login").with_json(&json!({ "mobile": "9999999999", "password": "nope-nope" })))
        .await;
    assert_eq!(resp.status_code, 401);
}

#[tokio::test]
async fn test_student_login() {
    let app = test_app().await;
    let token = app.super_admin().await;
    app.register_student(&token, "9820000000", ("Barasat", "B01")).await;

    let resp = app
        .send(api(Method::POST, "/login").with_json(&json!({ "mobile": 9820000000u64, "password": PASSWORD })))
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let body = resp.json_body().unwrap();
    assert_eq!(body["kind"], "student");
    assert_eq!(body["data"]["userId"], "RYIT/WB-B01/001");

    let resp = app.send(api(Method::POST, "/logout")).await;
    assert!(resp.headers["Set-Cookie"].contains("Max-Age=0"));
}

#[tokio::test]
async fn test_password_reset_link_is_single_use() {
    let app = test_app().await;
    app.super_admin().await;
    let email = "9000000000@example.com";

    let resp = app
        .send(api(Method::POST, "/forgetPassword").with_json(&json!({ "email": email })))
        .await;
    assert_eq!(resp.status_code, 200);
    let mail = app.mailer.last_to(email).unwrap();
    let token: String = mail
        .text
        .split("/reset-password/")
        .nth(1)
        .unwrap()
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    assert_eq!(token.len(), 64);

    let reset = api(Method::POST, &format!("/resetPassword/{}", token))
        .with_json(&json!({ "password": "brand-new-secret" }));
    let resp = app.send(reset.clone()).await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let resp = app.send(reset).await;
    assert_eq!(resp.status_code, 400);

    let resp = app
        .send(api(Method::POST, "/login").with_json(&json!({ "mobile": "9000000000", "password": "brand-new-secret" })))
        .await;
    assert_eq!(resp.status_code, 200);

    let resp = app
        .send(api(Method::POST, "/forgetPassword").with_json(&json!({ "email": "nobody@example.com" })))
        .await;
    assert_eq!(resp.status_code, 404);
}

#[tokio::test]
async fn test_branch_admin_management() {
    let app = test_app().await;
    let token = app.super_admin().await;

    let resp = app
        .send(
            api(Method::POST, "/branchadmin")
                .with_cookie("token", &token)
                .with_json(&json!({
                    "name": "Branch Head",
                    "email": "Head@Example.com",
                    "mobile": "9100000000",
                    "password": PASSWORD,
                    "branchName": "Barasat",
                    "branchCode": "B01",
                })),
        )
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let data = &resp.json_body().unwrap()["data"];
    assert_eq!(data["email"], "head@example.com");
    assert_eq!(data["isVerified"], true);
    let id = data["_id"].as_str().unwrap().to_string();

    let resp = app
        .send(api(Method::GET, "/get-all-branch-admins").with_cookie("token", &token))
        .await;
    assert_eq!(resp.json_body().unwrap()["data"].as_array().unwrap().len(), 1);

    // branch admins log in straight away
    let resp = app
        .send(api(Method::POST, "/login").with_json(&json!({ "mobile": "9100000000", "password": PASSWORD })))
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.json_body().unwrap()["role"], "branchAdmin");

    let resp = app
        .send(
            api(Method::DELETE, &format!("/delete-branch-admin/{}", id))
                .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 200);
}

#[tokio::test]
async fn test_leads_feed_notifications() {
    let app = test_app().await;
    let token = app.super_admin().await;

    // 1. Public submissions
    let resp = app
        .send(api(Method::POST, "/applyCourse").with_json(&json!({
            "name": "Ravi", "mobile": 9000011111u64, "center": "Barasat", "course": "DCA",
        })))
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let resp = app
        .send(api(Method::POST, "/applyCourse").with_json(&json!({
            "name": "Ravi again", "mobile": "9000011111", "center": "Barasat", "course": "DCA",
        })))
        .await;
    assert_eq!(resp.status_code, 400);
    let resp = app
        .send(api(Method::POST, "/apply-in-a-course").with_json(&json!({
            "courseName": "Tally", "name": "Mina", "ph": "9000022222",
        })))
        .await;
    assert_eq!(resp.status_code, 200);
    let resp = app
        .send(api(Method::POST, "/send-msg").with_json(&json!({
            "name": "Sam", "ph": "9000033333", "msg": "Call me back",
        })))
        .await;
    assert_eq!(resp.status_code, 200);
    let resp = app
        .send(api(Method::POST, "/send-msg").with_json(&json!({ "name": "Sam" })))
        .await;
    assert_eq!(resp.status_code, 400);

    // 2. Counts
    let notifications = api(Method::GET, "/get-notification").with_cookie("token", &token);
    let resp = app.send(notifications.clone()).await;
    assert_eq!(resp.status_code, 200);
    let data = &resp.json_body().unwrap()["data"];
    assert_eq!(data["branchCourseCount"], 1);
    assert_eq!(data["totalCount"], 3);
    let message_id = data["sendMsg"][0]["_id"].as_str().unwrap().to_string();

    // 3. Deleting
    let resp = app
        .send(
            api(Method::DELETE, &format!("/delete-notification/{}/bogus", message_id))
                .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 400);
    let resp = app
        .send(
            api(Method::DELETE, &format!("/delete-notification/{}/sendMsg", message_id))
                .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 200);
    let resp = app
        .send(
            api(Method::DELETE, &format!("/delete-notification/{}/sendMsg", message_id))
                .with_cookie("token", &token),
        )
        .await;
    assert_eq!(resp.status_code, 404);

    let resp = app.send(notifications).await;
    assert_eq!(resp.json_body().unwrap()["data"]["totalCount"], 2);
}

#[tokio::test]
async fn test_catalog_and_gallery() {
    let app = test_app().await;
    let token = app.super_admin().await;

    // 1. Courses
    let resp = app
        .send(
            api(Method::POST, "/addCourse")
                .with_cookie("token", &token)
                .with_json(&json!({ "courseName": "DCA", "duration": 6, "content": "Word, Excel" })),
        )
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let resp = app.send(api(Method::GET, "/getCourse")).await;
    assert_eq!(resp.json_body().unwrap()["data"][0]["duration"], "6");

    // 2. Team members need exactly one image
    let mut member = FormData::default();
    member.fields.insert("name".into(), "Priya".into());
    member.fields.insert("designation".into(), "Instructor".into());
    let resp = app
        .send(
            api(Method::POST, "/create-team")
                .with_cookie("token", &token)
                .with_form(member.clone()),
        )
        .await;
    assert_eq!(resp.status_code, 400);
    member.files.push(image("priya.png"));
    let resp = app
        .send(
            api(Method::POST, "/create-team")
                .with_cookie("token", &token)
                .with_form(member),
        )
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());

    // 3. Gallery accepts up to five
    let form = FormData {
        files: (0..6).map(|i| image(&format!("g{}.png", i))).collect(),
        ..FormData::default()
    };
    let resp = app
        .send(
            api(Method::POST, "/upload-image")
                .with_cookie("token", &token)
                .with_form(form),
        )
        .await;
    assert_eq!(resp.status_code, 400);
    let form = FormData {
        files: vec![image("a.png"), image("b.png")],
        ..FormData::default()
    };
    let resp = app
        .send(
            api(Method::POST, "/upload-image")
                .with_cookie("token", &token)
                .with_form(form),
        )
        .await;
    assert_eq!(resp.status_code, 200, "{}", resp.text());
    let resp = app.send(api(Method::GET, "/recent")).await;
    assert_eq!(resp.status_code, 200);
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let app = test_app().await;
    let resp = app.send(api(Method::GET, "/no-such-thing")).await;
    assert_eq!(resp.status_code, 404);
    let resp = app.send(api(Method::DELETE, "/getBranches")).await;
    assert_eq!(resp.status_code, 405);
}

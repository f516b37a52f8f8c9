//! services/api/src/adapters/catalog.rs
//!
//! The built-in message catalog behind the `Translator` port.

use cookstack_core::Translator;
use std::collections::HashMap;

const FALLBACK_LOCALE: &str = "en";

const EN: &[(&str, &str)] = &[
    // Errors
    ("invalidCredentials", "Invalid email or password."),
    ("emailInUse", "This email is already in use."),
    ("invalidCode", "The verification code is invalid or has expired."),
    ("invalidToken", "This link is invalid or has expired."),
    ("verificationCooldown", "A verification code was sent recently. Please check your inbox."),
    ("alreadyVerified", "Your email is already verified."),
    ("invalidOAuthState", "The sign-in attempt could not be verified. Please try again."),
    ("unverifiedProviderEmail", "Your Google account email is not verified."),
    ("unauthorized", "You must be signed in."),
    ("unverified", "Please verify your email first."),
    ("forbidden", "You are not allowed to do this."),
    ("notFound", "Not found."),
    ("alreadyExists", "This already exists."),
    ("referenceMissing", "A referenced item does not exist."),
    ("containsRecipes", "This category still contains recipes."),
    ("requestPending", "You already have a pending request for this role."),
    ("requestDecided", "This request has already been decided."),
    ("positionConflict", "Two items cannot share a position."),
    ("rateLimited", "Too many requests. Please try again later."),
    ("internalError", "Something went wrong."),
    ("noPassword", "This account signs in with Google."),
    ("invalidBody", "The request body is missing fields or has the wrong types."),
    ("malformedJson", "The request body is not valid JSON."),
    ("expectedJson", "The request body must be JSON."),
    ("invalidPath", "The address contains an invalid identifier."),
    // Field validation
    ("required", "This field is required."),
    ("invalidEmail", "Please enter a valid email address."),
    ("passwordLength", "Password must be between 8 and 255 characters."),
    ("passwordMismatch", "Passwords do not match."),
    ("nameExists", "This name is already taken."),
    ("invalidName", "Names must be between 1 and 100 characters."),
    ("invalidTitle", "Titles must be between 1 and 200 characters."),
    ("invalidUrl", "Please enter a valid URL."),
    ("invalidPage", "Page and page size must be positive."),
    ("tooLong", "This value is too long."),
    ("invalidPosition", "Positions must be zero or greater."),
    ("duplicateId", "The same item was submitted twice."),
    ("invalidRole", "This role cannot be requested."),
    ("invalidImage", "Please upload a JPEG, PNG, WebP or GIF image."),
    ("missingFile", "Please attach a file."),
    ("unsupportedLocale", "This language is not supported."),
    ("duplicateLocale", "Each language can only be given once."),
    // Mail
    ("verifyEmailSubject", "Verify your CookStack email"),
    (
        "verifyEmailBody",
        "<p>Your verification code is <strong>{code}</strong>.</p><p>It expires in 15 minutes.</p>",
    ),
    ("resetPasswordSubject", "Reset your CookStack password"),
    (
        "resetPasswordBody",
        "<p>Follow <a href=\"{link}\">this link</a> to choose a new password.</p><p>It expires in two hours.</p>",
    ),
];

const FR: &[(&str, &str)] = &[
    ("invalidCredentials", "E-mail ou mot de passe invalide."),
    ("emailInUse", "Cette adresse e-mail est déjà utilisée."),
    ("invalidCode", "Le code de vérification est invalide ou a expiré."),
    ("invalidToken", "Ce lien est invalide ou a expiré."),
    ("verificationCooldown", "Un code a été envoyé récemment. Consultez votre boîte de réception."),
    ("alreadyVerified", "Votre adresse e-mail est déjà vérifiée."),
    ("invalidOAuthState", "La connexion n'a pas pu être vérifiée. Veuillez réessayer."),
    ("unverifiedProviderEmail", "L'adresse e-mail de votre compte Google n'est pas vérifiée."),
    ("unauthorized", "Vous devez être connecté."),
    ("unverified", "Veuillez d'abord vérifier votre adresse e-mail."),
    ("forbidden", "Vous n'êtes pas autorisé à faire cela."),
    ("notFound", "Introuvable."),
    ("alreadyExists", "Cet élément existe déjà."),
    ("referenceMissing", "Un élément référencé n'existe pas."),
    ("containsRecipes", "Cette catégorie contient encore des recettes."),
    ("requestPending", "Vous avez déjà une demande en attente pour ce rôle."),
    ("requestDecided", "Cette demande a déjà été traitée."),
    ("positionConflict", "Deux éléments ne peuvent pas occuper la même position."),
    ("rateLimited", "Trop de requêtes. Veuillez réessayer plus tard."),
    ("internalError", "Une erreur est survenue."),
    ("noPassword", "Ce compte se connecte avec Google."),
    ("invalidBody", "Le corps de la requête est incomplet ou mal typé."),
    ("malformedJson", "Le corps de la requête n'est pas un JSON valide."),
    ("expectedJson", "Le corps de la requête doit être du JSON."),
    ("invalidPath", "L'adresse contient un identifiant invalide."),
    ("required", "Ce champ est obligatoire."),
    ("invalidEmail", "Veuillez saisir une adresse e-mail valide."),
    ("passwordLength", "Le mot de passe doit contenir entre 8 et 255 caractères."),
    ("passwordMismatch", "Les mots de passe ne correspondent pas."),
    ("nameExists", "Ce nom est déjà utilisé."),
    ("invalidName", "Le nom doit contenir entre 1 et 100 caractères."),
    ("invalidTitle", "Le titre doit contenir entre 1 et 200 caractères."),
    ("invalidUrl", "Veuillez saisir une URL valide."),
    ("invalidPage", "La page et la taille de page doivent être positives."),
    ("tooLong", "Cette valeur est trop longue."),
    ("invalidPosition", "Les positions doivent être positives ou nulles."),
    ("duplicateId", "Le même élément a été envoyé deux fois."),
    ("invalidRole", "Ce rôle ne peut pas être demandé."),
    ("invalidImage", "Veuillez envoyer une image JPEG, PNG, WebP ou GIF."),
    ("missingFile", "Veuillez joindre un fichier."),
    ("unsupportedLocale", "Cette langue n'est pas prise en charge."),
    ("duplicateLocale", "Chaque langue ne peut être donnée qu'une fois."),
    ("verifyEmailSubject", "Vérifiez votre adresse e-mail CookStack"),
    (
        "verifyEmailBody",
        "<p>Votre code de vérification est <strong>{code}</strong>.</p><p>Il expire dans 15 minutes.</p>",
    ),
    ("resetPasswordSubject", "Réinitialisez votre mot de passe CookStack"),
    (
        "resetPasswordBody",
        "<p>Suivez <a href=\"{link}\">ce lien</a> pour choisir un nouveau mot de passe.</p><p>Il expire dans deux heures.</p>",
    ),
];

pub struct Catalog {
    messages: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let messages = [("en", EN), ("fr", FR)]
            .into_iter()
            .map(|(locale, entries)| (locale, entries.iter().copied().collect()))
            .collect();
        Self { messages }
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&'static str> {
        self.messages.get(locale)?.get(key).copied()
    }
}

impl Translator for Catalog {
    fn translate(&self, locale: &str, key: &str, params: &[(&str, &str)]) -> String {
        let template = self
            .lookup(locale, key)
            .or_else(|| self.lookup(FALLBACK_LOCALE, key))
            .unwrap_or(key);

        params
            .iter()
            .fold(template.to_string(), |text, (name, value)| {
                text.replace(&format!("{{{}}}", name), value)
            })
    }
}

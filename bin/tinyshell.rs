fn main() {
    tinyshell_rs::shell_main()
}
